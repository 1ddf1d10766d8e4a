//! Same glob dialect as `r2e-cache` (`*`/`?`), duplicated here rather than
//! taken as a cross-crate dependency — it's a dozen lines and metrics
//! pattern matching over metric keys has no other reason to depend on the
//! cache crate.

pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, 0, &text, 0)
}

fn match_from(pattern: &[char], mut pi: usize, text: &[char], mut ti: usize) -> bool {
    let mut star_pi: Option<usize> = None;
    let mut star_ti = 0usize;

    loop {
        if pi < pattern.len() {
            match pattern[pi] {
                '*' => {
                    star_pi = Some(pi);
                    star_ti = ti;
                    pi += 1;
                    continue;
                }
                '?' if ti < text.len() => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                c if ti < text.len() && c == text[ti] => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                _ => {}
            }
        } else if ti == text.len() {
            return true;
        }

        if let Some(sp) = star_pi {
            star_ti += 1;
            if star_ti > text.len() {
                return false;
            }
            pi = sp + 1;
            ti = star_ti;
        } else {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_metric_prefix() {
        assert!(glob_match("http.*", "http.requests{method=GET}"));
        assert!(!glob_match("http.*", "cache.hits"));
    }
}
