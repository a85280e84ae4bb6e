use ignore::gitignore::{Gitignore, GitignoreBuilder};

/*
 * User-configured ignore patterns, one per line, with gitignore semantics:
 * `#` comments and blank lines are dropped, `!` re-includes, `*`/`?`/`**` glob,
 * a leading `/` anchors to the repository root and a trailing `/` matches only
 * directories (and so everything inside them). The last matching line wins.
 * Unlike a plain prefix match, `dir/` leaves a regular file named `dir` alone.
 *
 * Ignored nodes stay in the tree; the picker only flags them and leaves them
 * out of the copy.
 */
#[derive(Debug)]
pub struct IgnoreRules {
    matcher: Gitignore,
    pattern_count: usize,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::empty()
    }
}

impl IgnoreRules {
    pub fn empty() -> Self {
        IgnoreRules {
            matcher: Gitignore::empty(),
            pattern_count: 0,
        }
    }

    // Invalid lines are logged and skipped so one typo does not drop every rule.
    pub fn parse(raw: &str) -> Self {
        let mut builder = GitignoreBuilder::new("");
        let mut pattern_count = 0;
        for (line_num, line) in raw.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match builder.add_line(None, trimmed) {
                Ok(_) => pattern_count += 1,
                Err(e) => log::warn!(
                    "IgnoreRules: Skipping invalid pattern '{trimmed}' on line {}: {e}",
                    line_num + 1
                ),
            }
        }

        match builder.build() {
            Ok(matcher) => {
                log::debug!("IgnoreRules: Parsed {pattern_count} pattern(s).");
                IgnoreRules {
                    matcher,
                    pattern_count,
                }
            }
            Err(e) => {
                log::error!("IgnoreRules: Failed to build ignore matcher: {e}");
                Self::empty()
            }
        }
    }

    /*
     * Whether `path` (a `/`-separated repository path) is ignored, either itself
     * or through one of its parent directories.
     */
    pub fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
        let path = path.trim_start_matches('/');
        if path.is_empty() || self.pattern_count == 0 {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }

    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    pub fn is_empty(&self) -> bool {
        self.pattern_count == 0
    }
}
