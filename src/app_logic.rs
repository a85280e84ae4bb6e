/*
 * This module provides the application logic layer: `PickerSession`, the
 * presenter that turns typed commands into operations on the selection tree and
 * the copy action, and the parser for those commands.
 * Unit tests for `PickerSession` are in `picker_session_tests.rs`.
 */
pub mod command_parser;
pub mod picker_session;


pub use command_parser::UserCommand;
pub use picker_session::{PickerServices, PickerSession, SessionReply, TREE_MOUNT_POINT};
