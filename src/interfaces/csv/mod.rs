pub mod event_reader;
pub mod order_writer;
pub mod replay;
