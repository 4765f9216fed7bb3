pub mod line_splitter;
pub mod mysql;
pub mod process;
pub mod ssh;
