//! CLI Exit Code Registry
//!
//! Single source of truth for all CLI exit codes. Exit codes are part of
//! the shell contract — scripts rely on them.
//!
//! | Range | Domain    | Description                              |
//! |-------|-----------|------------------------------------------|
//! | 0     | Universal | Success                                  |
//! | 1     | Universal | General error / differences found        |
//! | 2     | Universal | CLI usage error (bad args, missing file) |
//! | 3-9   | Data      | Rule-table and source-file codes         |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Compare found discrepancies. Like `diff(1)`, exit 1 means "sides differ."
pub const EXIT_COMPARE_DIFFS: u8 = 1;

/// Rule table failed to parse or validate.
pub const EXIT_RULES_INVALID: u8 = 3;

/// Source export failed to load (missing column, unreadable file).
pub const EXIT_SOURCE_PARSE: u8 = 4;
