pub mod debug;
pub mod prompt;
pub mod sheet_view;
