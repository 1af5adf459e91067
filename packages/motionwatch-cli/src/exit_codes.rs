pub const SUCCESS: i32 = 0;
pub const EXECUTION_ERROR: i32 = 1;
pub const INPUT_ERROR: i32 = 2;
/// Some inputs of a batch failed
pub const PARTIAL_FAILURE: i32 = 3;
/// The monitor stopped on a sensor timeout or allocation failure
pub const FATAL_SHUTDOWN: i32 = 4;
