mod connection;
mod frame;
