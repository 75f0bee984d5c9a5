//! Ledger error codes carried in every RPC envelope and per submitted item.

pub const SUCCESS: i32 = 0;
pub const INTERNAL_ERROR: i32 = 1;
pub const INVALID_PARAMETER: i32 = 2;
pub const ALREADY_EXISTS: i32 = 3;
pub const NOT_EXIST: i32 = 4;
pub const NOT_ENOUGH_WEIGHT: i32 = 93;
pub const BAD_SEQUENCE: i32 = 99;
pub const ACCOUNT_LOW_RESERVE: i32 = 100;
pub const CONTRACT_EXECUTE_FAIL: i32 = 151;
pub const RANGEPROOF_VERIFY: i32 = 210;
