
mod codec;
mod handler;
mod listeners;
mod message;
mod paths;
mod supervisor;
mod thread_guard;
