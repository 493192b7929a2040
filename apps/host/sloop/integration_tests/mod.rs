mod host_tests {
    pub mod helpers;
    mod wiring;
}
