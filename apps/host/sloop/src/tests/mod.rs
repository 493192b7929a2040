mod backend;

mod notifier;
