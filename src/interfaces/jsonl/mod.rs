pub mod event_log_reader;
