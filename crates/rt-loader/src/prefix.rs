//! Prefix-guessing heuristic for a library whose caller didn't supply one:
//! strip a conventional `lib`/`cyg`/`tcl` prefix, keep the leading
//! alphabetic run of what remains (which drops trailing version digits for
//! free), and capitalize the initial letter.

/// `derive_prefix("libtcl86.so") == "Tcl"`, `derive_prefix("cygfoo-1.dll")
/// == "Foo"`. Returns an empty string if nothing alphabetic remains —
/// callers treat that as `WHATLIBRARY`.
pub fn derive_prefix(file_name: &str) -> String {
    let base = std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    let mut rest = base;
    for conventional in ["lib", "cyg", "tcl"] {
        if let Some(stripped) = strip_prefix_case_insensitive(rest, conventional) {
            rest = stripped;
            break;
        }
    }

    let alpha_run: String = rest.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let mut chars = alpha_run.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn strip_prefix_case_insensitive<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes()) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_lib_prefix_and_version_digits() {
        assert_eq!(derive_prefix("libtcl86.so"), "Tcl");
    }

    #[test]
    fn strips_cyg_prefix_case_insensitively() {
        assert_eq!(derive_prefix("CYGfoo-1.dll"), "Foo");
    }

    #[test]
    fn keeps_the_whole_alphabetic_run_when_no_digits_follow() {
        assert_eq!(derive_prefix("libmysqlclient.so"), "Mysqlclient");
    }

    #[test]
    fn empty_result_for_an_all_numeric_stem() {
        assert_eq!(derive_prefix("lib1234.so"), "");
    }
}
