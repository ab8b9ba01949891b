//! Envelope `msg` texts.

pub const BAD_REQUEST: &str = "Bad Request";
pub const UNAUTHORIZED: &str = "Unauthorized";
pub const FORBIDDEN: &str = "Forbidden";
pub const NOT_FOUND: &str = "Not Found";
pub const INTERNAL_ERROR: &str = "Internal Server Error";

pub const VALIDATION_FAILED: &str = "The given data was invalid.";
pub const MALFORMED_BODY: &str = "The request body could not be parsed.";

pub const CREATED: &str = "User created successfully.";
pub const UPDATED: &str = "User updated successfully.";
pub const DELETED: &str = "User deleted successfully.";

pub const CREATE_FAILED: &str = "Failed to create user.";
pub const UPDATE_FAILED: &str = "Failed to update user.";
pub const DELETE_FAILED: &str = "Failed to delete user.";
