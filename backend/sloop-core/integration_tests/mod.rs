mod backend_tests {
    pub mod helpers;

    mod connection;
    mod instance;
    mod registry;
    mod supervision;
}

mod config_tests {
    mod loading;
}
