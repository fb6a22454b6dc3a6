// ============================================================================
// Constants
// ============================================================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = match option_env!("BUILD_COMMIT") {
    Some(c) => c,
    None => "unknown",
};

/// Get the full version string including commit.
pub fn version_string() -> String {
    format!("{VERSION} (commit: {COMMIT})")
}

// ============================================================================
// Tests
// ============================================================================
