//! Implementation of `kpm update`.

use std::path::Path;

use anyhow::Result;

use crate::core::SourceId;
use crate::ops::lockfile::persist;
use crate::ops::resolve::{load_root, resolve_with, ResolveResult};
use crate::util::{fs, GlobalContext};

/// Re-fetch every remote dependency of the module and rewrite its lock file.
///
/// Sources are downloaded again even when cached, so moved branches and
/// retagged artifacts are picked up. Nothing is written unless the whole
/// resolution succeeds.
pub fn update(ctx: &GlobalContext, module_dir: &Path) -> Result<ResolveResult> {
    let module_dir = &fs::normalize_path(&ctx.cwd().join(module_dir));
    let cache = ctx.source_cache().with_refresh(true);
    cache.lock_home()?;

    let root = load_root(module_dir)?;
    tracing::info!("updating dependencies of {}", root.name());
    let result = resolve_with(ctx, &cache, root, SourceId::for_path(module_dir), false)?;

    persist(None, result.lock())?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::errors::ResolveError;
    use crate::test_support::{write_module, FixtureFetcher, GitFixture};
    use crate::util::shell::captured;
    use crate::util::Shell;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn context(w: &Path) -> (GlobalContext, Arc<Mutex<Vec<u8>>>) {
        let (shell, buffer) = Shell::capture();
        let shell = Arc::new(shell);
        let ctx = GlobalContext::with_cwd_and_home(w.to_path_buf(), w.join("home"))
            .with_fetcher(Arc::new(FixtureFetcher::new(Arc::clone(&shell))))
            .with_shell(shell);
        (ctx, buffer)
    }

    fn git_dep(repo: &GitFixture, branch: &str, version: &str) -> String {
        format!(
            "{{ git = \"{}\", branch = \"{}\", version = \"{}\" }}",
            repo.url(),
            branch,
            version
        )
    }

    #[test]
    fn test_update_picks_up_moved_branch() {
        let tmp = TempDir::new().unwrap();
        let w = tmp.path();
        let repo = GitFixture::init(&w.join("repos/helloworld"), "helloworld", "0.1.0");
        repo.branch("main-line", "helloworld", "0.1.0");
        write_module(
            &w.join("app"),
            "app",
            "0.0.1",
            &[("helloworld", git_dep(&repo, "main-line", "0.1.0").as_str())],
        );

        let (ctx, buffer) = context(w);
        update(&ctx, &w.join("app")).unwrap();
        let first = std::fs::read_to_string(w.join("app/kcl.mod.lock")).unwrap();

        repo.commit_files(
            "refs/heads/main-line",
            &[
                ("kcl.mod", "[package]\nname = \"helloworld\"\nversion = \"0.1.0\"\n"),
                ("main.k", "a = 1\n"),
            ],
        );
        let result = update(&ctx, &w.join("app")).unwrap();
        let second = std::fs::read_to_string(w.join("app/kcl.mod.lock")).unwrap();

        let line = format!("cloning '{}' with branch 'main-line'\n", repo.url());
        assert_eq!(captured(&buffer), format!("{}{}", line, line));
        assert_ne!(first, second);
        let path = &result.dependency_map()["helloworld"];
        assert!(path.join("main.k").is_file());
    }

    #[test]
    fn test_unsatisfiable_version_leaves_files_unchanged() {
        let tmp = TempDir::new().unwrap();
        let w = tmp.path();
        let repo = GitFixture::init(&w.join("repos/flask"), "flask_manifests", "0.0.1");
        repo.branch("release", "flask_manifests", "0.0.1");
        write_module(
            &w.join("app"),
            "app",
            "0.0.1",
            &[("flask_manifests", git_dep(&repo, "release", "0.0.1").as_str())],
        );

        let (ctx, buffer) = context(w);
        update(&ctx, &w.join("app")).unwrap();

        write_module(
            &w.join("app"),
            "app",
            "0.0.1",
            &[("flask_manifests", git_dep(&repo, "release", "0.100.0").as_str())],
        );
        let manifest = std::fs::read_to_string(w.join("app/kcl.mod")).unwrap();
        let lock = std::fs::read_to_string(w.join("app/kcl.mod.lock")).unwrap();

        let err = update(&ctx, &w.join("app")).unwrap_err();
        match err.downcast_ref::<ResolveError>() {
            Some(ResolveError::VersionNotFound { name, version }) => {
                assert_eq!(name, "flask_manifests");
                assert_eq!(version, "0.100.0");
            }
            other => panic!("expected VersionNotFound, got {:?}", other),
        }
        assert_eq!(err.to_string(), "package 'flask_manifests:0.100.0' not found");

        assert_eq!(std::fs::read_to_string(w.join("app/kcl.mod")).unwrap(), manifest);
        assert_eq!(std::fs::read_to_string(w.join("app/kcl.mod.lock")).unwrap(), lock);

        // The clone happens before the version is checked.
        let clones = captured(&buffer)
            .lines()
            .filter(|l| l.starts_with("cloning"))
            .count();
        assert_eq!(clones, 2);
    }

    #[test]
    fn test_update_keeps_unrelated_lock_entries() {
        let tmp = TempDir::new().unwrap();
        let w = tmp.path();
        write_module(&w.join("base"), "base", "0.1.0", &[]);
        write_module(&w.join("app"), "app", "0.0.1", &[("base", r#"{ path = "../base" }"#)]);
        let stale = "# hand edited\nversion = 1\n\n[dependencies.retired]\nname = \"retired\"\nversion = \"1.0.0\"\nsource = \"path+/nowhere\"\nlocal_path = \"/nowhere\"\n";
        std::fs::write(w.join("app/kcl.mod.lock"), stale).unwrap();

        let (ctx, _) = context(w);
        update(&ctx, &w.join("app")).unwrap();

        let lock = std::fs::read_to_string(w.join("app/kcl.mod.lock")).unwrap();
        assert!(lock.starts_with(stale));
        assert!(lock.contains("[dependencies.base]\n"));
    }

    #[test]
    fn test_update_with_relative_module_dir() {
        let tmp = TempDir::new().unwrap();
        let w = tmp.path();
        write_module(&w.join("base"), "base", "0.1.0", &[]);
        write_module(&w.join("app"), "app", "0.0.1", &[("base", r#"{ path = "../base" }"#)]);

        let (ctx, _) = context(w);
        let result = update(&ctx, Path::new("app")).unwrap();
        assert_eq!(result.lock().path(), w.join("app/kcl.mod.lock"));
        assert!(w.join("app/kcl.mod.lock").is_file());
    }
}
