use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// `SYMDEX_QUIET=1` hides the progress bar and per-file lines
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("SYMDEX_QUIET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}
