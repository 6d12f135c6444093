// src/exec/expand.rs

//! Environment-variable expansion for command text and working directories.
//!
//! `$VAR` and `${VAR}` are replaced with the variable's value. Unset
//! variables expand to the empty string, the same way a POSIX shell treats
//! them without `set -u`. Expansion happens before the shell sees the text,
//! so shell-local variables must be written `$$name`; `$$` yields a literal `$`.

/// Expand against the current process environment.
pub fn expand_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand using an explicit lookup function.
pub fn expand_with<F>(input: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    // `$$` is split out first so an escaped dollar never starts a reference.
    input
        .split("$$")
        .map(|part| {
            shellexpand::env_with_context_no_errors(part, |name: &str| {
                Some(lookup(name).unwrap_or_default())
            })
            .into_owned()
        })
        .collect::<Vec<_>>()
        .join("$")
}
