pub mod identity_cmd;
pub mod parsers;
pub mod serial_cmd;
pub mod test_cmd;
