//! Thin wrappers over the `git` client.

use std::path::Path;

use crate::error::DepsError;
use crate::io::remove_all;
use crate::tools::ToolEnv;

/// Clone `url` into `dir` if needed and check out `version`.
///
/// `fetch_force` wipes `dir` first. A fresh clone always fetches; otherwise
/// the existing checkout is refreshed only when `fetch` is set.
///
/// # Errors
///
/// Propagates filesystem and `git` failures.
pub fn clone_and_checkout(
    env: &mut ToolEnv,
    url: &str,
    version: &str,
    dir: &Path,
    mut fetch: bool,
    fetch_force: bool,
) -> Result<(), DepsError> {
    if fetch_force {
        remove_all(dir)?;
    }

    if !dir.join(".git").exists() {
        env.command("git").arg("clone").arg(url).arg(dir).run()?;
        fetch = true;
    }

    if fetch {
        let scope = env.in_dir(dir);
        scope.command("git").arg("fetch").run()?;
        scope.command("git").args(["reset", "--hard"]).run()?;
        scope.command("git").args(["clean", "-df"]).run()?;
        scope.command("git").args(["checkout", "-f", version]).run()?;
    }
    Ok(())
}

/// Fetch exactly one commit of `url` into a fresh `dir`.
///
/// # Errors
///
/// Propagates filesystem and `git` failures.
pub fn clone_shallow(env: &mut ToolEnv, url: &str, commit: &str, dir: &Path) -> Result<(), DepsError> {
    remove_all(dir)?;
    std::fs::create_dir_all(dir)?;

    let scope = env.in_dir(dir);
    scope.command("git").arg("init").run()?;
    scope
        .command("git")
        .args(["remote", "add", "origin", url])
        .run()?;
    scope
        .command("git")
        .args(["fetch", "--depth=1", "origin", commit])
        .run()?;
    scope
        .command("git")
        .args(["reset", "--hard", "FETCH_HEAD"])
        .run()?;
    Ok(())
}

/// Commit hash checked out at `dir`.
///
/// # Errors
///
/// Propagates `git` failures.
pub fn head_commit(env: &ToolEnv, dir: &Path) -> Result<String, DepsError> {
    Ok(env
        .command("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .capture()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        ToolEnv::new().resolve("git").is_ok()
    }

    fn make_repo(env: &ToolEnv, dir: &Path) -> String {
        std::fs::create_dir_all(dir).unwrap();
        let git = |args: &[&str]| {
            env.command("git")
                .args(args)
                .current_dir(dir)
                .env("GIT_AUTHOR_NAME", "sdkbuild")
                .env("GIT_AUTHOR_EMAIL", "sdkbuild@localhost")
                .env("GIT_COMMITTER_NAME", "sdkbuild")
                .env("GIT_COMMITTER_EMAIL", "sdkbuild@localhost")
                .run()
                .unwrap();
        };
        git(&["init", "-q"]);
        git(&["config", "uploadpack.allowAnySHA1InWant", "true"]);
        std::fs::write(dir.join("VERSION"), "SORA_CPP_SDK_VERSION=1.0.0\n").unwrap();
        git(&["add", "VERSION"]);
        git(&["commit", "-q", "-m", "initial"]);
        head_commit(env, dir).unwrap()
    }

    #[test]
    fn test_clone_and_checkout_from_local_repo() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let mut env = ToolEnv::new();
        let upstream = tmp.path().join("upstream");
        let commit = make_repo(&env, &upstream);

        let checkout = tmp.path().join("checkout");
        let url = upstream.to_string_lossy().into_owned();
        clone_and_checkout(&mut env, &url, &commit, &checkout, false, false).unwrap();

        assert!(checkout.join("VERSION").is_file());
        assert_eq!(head_commit(&env, &checkout).unwrap(), commit);
        assert_eq!(env.cwd(), None);
    }

    #[test]
    fn test_clone_shallow_resets_directory() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let mut env = ToolEnv::new();
        let upstream = tmp.path().join("upstream");
        let commit = make_repo(&env, &upstream);

        let dest = tmp.path().join("libcxx");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale"), "old").unwrap();

        let url = format!("file://{}", upstream.display());
        clone_shallow(&mut env, &url, &commit, &dest).unwrap();

        assert!(!dest.join("stale").exists());
        assert!(dest.join("VERSION").is_file());
    }
}
