//! On-disk fixtures: module directories and local git repositories.

use std::path::{Path, PathBuf};

use git2::{Commit, IndexAddOption, ObjectType, Repository, Signature};
use url::Url;

/// Manifest text for a module.
pub fn manifest(name: &str, version: &str, deps: &[(&str, &str)]) -> String {
    let mut content = format!(
        "[package]\nname = \"{}\"\nedition = \"v0.11.0\"\nversion = \"{}\"\n\n[dependencies]\n",
        name, version
    );
    for (dep, spec) in deps {
        content.push_str(&format!("{} = {}\n", dep, spec));
    }
    content
}

/// Write a module with the given dependencies (`name = <toml value>`) to `dir`.
pub fn write_module(dir: &Path, name: &str, version: &str, deps: &[(&str, &str)]) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("kcl.mod"), manifest(name, version, deps)).unwrap();
}

/// A git repository on local disk, cloneable through a `file://` URL.
pub struct GitFixture {
    repo: Repository,
    root: PathBuf,
}

impl GitFixture {
    /// Create a repository whose first commit holds a module manifest.
    pub fn init(root: &Path, name: &str, version: &str) -> Self {
        std::fs::create_dir_all(root).unwrap();
        let fixture = GitFixture {
            repo: Repository::init(root).unwrap(),
            root: root.to_path_buf(),
        };
        fixture.commit_manifest(name, version);
        fixture
    }

    pub fn url(&self) -> String {
        Url::from_file_path(&self.root).unwrap().to_string()
    }

    pub fn head_commit(&self) -> String {
        self.repo
            .head()
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id()
            .to_string()
    }

    /// Commit a new manifest on the current branch.
    pub fn commit_manifest(&self, name: &str, version: &str) -> String {
        self.commit_files("HEAD", &[("kcl.mod", manifest(name, version, &[]).as_str())])
    }

    /// Commit a manifest on `branch`, creating it from HEAD if needed.
    pub fn branch(&self, branch: &str, name: &str, version: &str) -> String {
        self.commit_files(
            &format!("refs/heads/{}", branch),
            &[("kcl.mod", manifest(name, version, &[]).as_str())],
        )
    }

    /// Tag the current HEAD.
    pub fn tag(&self, tag: &str) {
        let head = self.repo.head().unwrap().peel(ObjectType::Commit).unwrap();
        self.repo.tag_lightweight(tag, &head, false).unwrap();
    }

    /// Commit exactly `files` as the tree of `refname`.
    pub fn commit_files(&self, refname: &str, files: &[(&str, &str)]) -> String {
        for entry in std::fs::read_dir(&self.root).unwrap() {
            let path = entry.unwrap().path();
            if path.file_name().is_some_and(|n| n == ".git") {
                continue;
            }
            if path.is_dir() {
                std::fs::remove_dir_all(&path).unwrap();
            } else {
                std::fs::remove_file(&path).unwrap();
            }
        }
        for (rel, content) in files {
            let path = self.root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        let mut index = self.repo.index().unwrap();
        index.clear().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

        let parent: Option<Commit<'_>> = self
            .repo
            .refname_to_id(refname)
            .or_else(|_| self.repo.refname_to_id("HEAD"))
            .ok()
            .map(|id| self.repo.find_commit(id).unwrap());
        let parents: Vec<&Commit<'_>> = parent.iter().collect();

        let sig = Signature::now("kpm", "kpm@example.com").unwrap();
        self.repo
            .commit(Some(refname), &sig, &sig, "fixture", &tree, &parents)
            .unwrap()
            .to_string()
    }
}
