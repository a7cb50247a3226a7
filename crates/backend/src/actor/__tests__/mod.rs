mod helpers;
mod server;
