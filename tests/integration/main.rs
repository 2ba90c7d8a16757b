//! Integration tests for vcsdeps


mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Command isolated from the user's config and cache
    fn vcsdeps(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("vcsdeps");
        cmd.env_remove("VCSDEPS_CONFIG")
            .env_remove("VCSDEPS_CACHE_DIR")
            .arg("--config")
            .arg(temp.path().join("config.toml"))
            .arg("--cache-dir")
            .arg(temp.path().join("cache"));
        cmd
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("vcsdeps")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("resolve"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("vcsdeps")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("vcsdeps"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        vcsdeps(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let temp = TempDir::new().unwrap();
        vcsdeps(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[resolution]"))
            .stdout(predicate::str::contains("cross_process_lock = true"));
    }

    #[test]
    fn config_set_then_show() {
        let temp = TempDir::new().unwrap();
        vcsdeps(&temp)
            .args(["config", "set", "resolution.offline", "true"])
            .assert()
            .success();

        vcsdeps(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("offline = true"));
    }

    #[test]
    fn config_set_unknown_key() {
        let temp = TempDir::new().unwrap();
        vcsdeps(&temp)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn cache_path() {
        let temp = TempDir::new().unwrap();
        vcsdeps(&temp)
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache"));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        vcsdeps(&temp)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached checkouts found"));
    }

    #[test]
    fn cache_gc_empty() {
        let temp = TempDir::new().unwrap();
        vcsdeps(&temp)
            .args(["cache", "gc", "--days", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No checkouts unused for 1 days"));
    }

    #[test]
    fn resolve_offline_miss() {
        let temp = TempDir::new().unwrap();
        vcsdeps(&temp)
            .args([
                "resolve",
                "https://example.invalid/repo.git",
                "v1.0.0",
                "--offline",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("in offline mode"))
            .stderr(predicate::str::contains("Hint:"));

        assert!(!temp.path().join("cache").exists());
    }

    #[test]
    fn resolve_invalid_constraint() {
        let temp = TempDir::new().unwrap();
        vcsdeps(&temp)
            .args(["resolve", "https://example.invalid/repo.git", ">=banana"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid version constraint"));
    }

    #[test]
    fn resolve_unsupported_kind() {
        let temp = TempDir::new().unwrap();
        vcsdeps(&temp)
            .args([
                "resolve",
                "https://example.invalid/repo",
                "1.0",
                "--kind",
                "svn",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No version control system registered"));
    }
}

mod resolver_tests {
    use crate::fake_vcs::{FakeVcs, VERSION_FILE};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use vcsdeps::cache::{CacheKey, CacheLayout, PersistentMetadataCache};
    use vcsdeps::repository::{ModuleSelector, RepositorySpec, VcsKind};
    use vcsdeps::resolver::{ResolutionMode, ResolveRequest, ResolverOptions, VcsResolver};
    use vcsdeps::vcs::{VcsRegistry, VersionControlSystem};
    use vcsdeps::version::{ResolvedVersion, VersionConstraint};
    use vcsdeps::VcsError;

    const REPO: &str = "https://example/repo.git";

    fn resolver(mode: ResolutionMode, root: &Path, vcs: &Arc<FakeVcs>) -> VcsResolver {
        let mut registry = VcsRegistry::new();
        registry.register(vcs.clone() as Arc<dyn VersionControlSystem>);
        VcsResolver::new(
            mode,
            CacheLayout::new(root),
            registry,
            ResolverOptions::default(),
        )
    }

    fn spec(url: &str) -> RepositorySpec {
        RepositorySpec::git(url).unwrap()
    }

    fn constraint(text: &str) -> VersionConstraint {
        text.parse().unwrap()
    }

    async fn resolve(
        resolver: &VcsResolver,
        spec: &RepositorySpec,
        text: &str,
    ) -> Result<PathBuf, VcsError> {
        let selector = ModuleSelector::new("com.example", spec.short_name(), text);
        resolver
            .resolve_working_dir(&selector, spec, &constraint(text))
            .await
    }

    fn checked_out(dir: &Path) -> String {
        std::fs::read_to_string(dir.join(VERSION_FILE)).unwrap()
    }

    fn staging_dirs(root: &Path) -> Vec<PathBuf> {
        let checkouts = root.join("checkouts");
        let Ok(repos) = std::fs::read_dir(&checkouts) else {
            return vec![];
        };
        repos
            .flatten()
            .flat_map(|repo| std::fs::read_dir(repo.path()).unwrap().flatten())
            .map(|e| e.path())
            .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with(".tmp-"))
            .collect()
    }

    /// Abandoned staging dirs are removed on the blocking pool, so give it a moment
    async fn staging_cleared(root: &Path) -> bool {
        for _ in 0..100 {
            if staging_dirs(root).is_empty() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn reuse_within_a_resolver() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let resolver = resolver(ResolutionMode::Online, temp.path(), &vcs);

        let first = resolve(&resolver, &spec(REPO), "latest").await.unwrap();
        let second = resolve(&resolver, &spec(REPO), "latest").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(vcs.checkout_calls(), 1);
        assert_eq!(vcs.list_calls(), 1);
        assert_eq!(checked_out(&first), "c-main-1");
        assert_eq!(resolver.memory_cache().len(), 1);
    }

    #[tokio::test]
    async fn offline_reuses_recorded_checkout() {
        let temp = TempDir::new().unwrap();
        let online_vcs = Arc::new(FakeVcs::with_releases());
        let online = resolver(ResolutionMode::Online, temp.path(), &online_vcs);
        let recorded = resolve(&online, &spec(REPO), "1.+").await.unwrap();
        assert_eq!(checked_out(&recorded), "c-120");

        let offline_vcs = Arc::new(FakeVcs::with_releases());
        let offline = resolver(ResolutionMode::Offline, temp.path(), &offline_vcs);
        assert_eq!(offline.mode(), ResolutionMode::Offline);

        let reused = resolve(&offline, &spec(REPO), "1.+").await.unwrap();

        assert_eq!(reused, recorded);
        assert_eq!(offline_vcs.total_calls(), 0);
    }

    #[tokio::test]
    async fn offline_does_not_reset_local_changes() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let dir = resolve(
            &resolver(ResolutionMode::Online, temp.path(), &vcs),
            &spec(REPO),
            "v1.0.0",
        )
        .await
        .unwrap();
        std::fs::write(dir.join(VERSION_FILE), "edited").unwrap();

        let offline = resolver(ResolutionMode::Offline, temp.path(), &vcs);
        let calls = vcs.total_calls();
        let reused = resolve(&offline, &spec(REPO), "v1.0.0").await.unwrap();

        assert_eq!(checked_out(&reused), "edited");
        assert_eq!(vcs.total_calls(), calls);
    }

    #[tokio::test]
    async fn offline_miss_fails_without_side_effects() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let offline = resolver(ResolutionMode::Offline, temp.path(), &vcs);

        let err = resolve(&offline, &spec(REPO), "v1.0.0").await.unwrap_err();

        assert!(matches!(err, VcsError::OfflineResolution { .. }));
        let message = err.to_string();
        assert!(message.contains("in offline mode"), "{}", message);
        assert!(message.contains(REPO), "{}", message);
        assert!(message.contains("com.example:repo:v1.0.0"), "{}", message);
        assert_eq!(vcs.total_calls(), 0);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn upstream_drift_moves_to_new_version() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());

        let first = resolve(
            &resolver(ResolutionMode::Online, temp.path(), &vcs),
            &spec(REPO),
            "latest",
        )
        .await
        .unwrap();
        assert_eq!(checked_out(&first), "c-main-1");

        vcs.advance_head("c-main-2");
        let second = resolve(
            &resolver(ResolutionMode::Online, temp.path(), &vcs),
            &spec(REPO),
            "latest",
        )
        .await
        .unwrap();

        assert_ne!(first, second);
        assert_eq!(checked_out(&second), "c-main-2");

        let persistent = PersistentMetadataCache::new(CacheLayout::new(temp.path()));
        let entry = persistent
            .get(&CacheKey::new(&spec(REPO), &constraint("latest")))
            .await
            .unwrap();
        assert_eq!(entry.working_dir, second);
        assert_eq!(entry.selected_version.id, "c-main-2");
    }

    #[tokio::test]
    async fn unchanged_mutable_constraint_resets_in_place() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());

        let first = resolve(
            &resolver(ResolutionMode::Online, temp.path(), &vcs),
            &spec(REPO),
            "branch:develop",
        )
        .await
        .unwrap();
        std::fs::write(first.join(VERSION_FILE), "dirty").unwrap();

        let second = resolve(
            &resolver(ResolutionMode::Online, temp.path(), &vcs),
            &spec(REPO),
            "branch:develop",
        )
        .await
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(checked_out(&second), "c-dev-1");
        assert_eq!(vcs.checkout_calls(), 1);
        assert_eq!(vcs.reset_calls(), 1);
        assert_eq!(vcs.list_calls(), 2);
    }

    #[tokio::test]
    async fn immutable_constraint_skips_listing_on_reuse() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());

        resolve(
            &resolver(ResolutionMode::Online, temp.path(), &vcs),
            &spec(REPO),
            "v2.0.0",
        )
        .await
        .unwrap();
        resolve(
            &resolver(ResolutionMode::Online, temp.path(), &vcs),
            &spec(REPO),
            "v2.0.0",
        )
        .await
        .unwrap();

        assert_eq!(vcs.list_calls(), 0);
        assert_eq!(vcs.checkout_calls(), 1);
        assert_eq!(vcs.reset_calls(), 1);
    }

    #[tokio::test]
    async fn disjoint_repositories_never_share_directories() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let resolver = resolver(ResolutionMode::Online, temp.path(), &vcs);

        let a = resolve(&resolver, &spec("https://example/a/repo.git"), "v1.0.0")
            .await
            .unwrap();
        let b = resolve(&resolver, &spec("https://example/b/repo.git"), "v1.0.0")
            .await
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(vcs.checkout_calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_identical_requests_check_out_once() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        vcs.set_checkout_delay(Duration::from_millis(50));
        let resolver = Arc::new(resolver(ResolutionMode::Online, temp.path(), &vcs));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolve(&resolver, &spec(REPO), "latest").await })
            })
            .collect();

        let mut paths = vec![];
        for task in tasks {
            paths.push(task.await.unwrap().unwrap());
        }

        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(vcs.checkout_calls(), 1);
        assert!(staging_cleared(temp.path()).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn resolvers_sharing_a_cache_check_out_once() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        vcs.set_checkout_delay(Duration::from_millis(50));

        let a = resolver(ResolutionMode::Online, temp.path(), &vcs);
        let b = resolver(ResolutionMode::Online, temp.path(), &vcs);

        let spec = spec(REPO);
        let (first, second) = tokio::join!(
            resolve(&a, &spec, "v1.2.0"),
            resolve(&b, &spec, "v1.2.0")
        );

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(vcs.checkout_calls(), 1);
        assert_eq!(vcs.reset_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn constraints_sharing_a_checkout_never_reset_it_concurrently() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        vcs.set_checkout_delay(Duration::from_millis(20));
        vcs.set_reset_delay(Duration::from_millis(30));

        // three distinct keys that all select commit c-main-1
        let requests: Vec<_> = ["latest", "branch:main", "c-main-1"]
            .into_iter()
            .map(|text| {
                ResolveRequest::new(
                    ModuleSelector::for_repository(&spec(REPO), text),
                    spec(REPO),
                    constraint(text),
                )
            })
            .collect();

        for round in 0..3 {
            let resolver = resolver(ResolutionMode::Online, temp.path(), &vcs);
            let paths: Vec<PathBuf> = resolver
                .resolve_all(&requests)
                .await
                .into_iter()
                .map(|result| result.unwrap())
                .collect();

            assert!(paths.windows(2).all(|w| w[0] == w[1]), "round {}", round);
            assert_eq!(checked_out(&paths[0]), "c-main-1");
        }

        assert_eq!(vcs.overlapping_resets(), 0);
        assert_eq!(vcs.checkout_calls(), 1);
        assert_eq!(vcs.reset_calls(), 8);
        assert!(staging_cleared(temp.path()).await);
    }

    #[tokio::test]
    async fn drift_survives_concurrent_reuse_of_the_old_checkout() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let spec = spec(REPO);

        let first = resolver(ResolutionMode::Online, temp.path(), &vcs);
        let shared = resolve(&first, &spec, "branch:main").await.unwrap();
        assert_eq!(resolve(&first, &spec, "c-main-1").await.unwrap(), shared);

        vcs.advance_head("c-main-2");
        vcs.set_reset_delay(Duration::from_millis(20));
        let second = resolver(ResolutionMode::Online, temp.path(), &vcs);
        let (moved, reused) = tokio::join!(
            resolve(&second, &spec, "branch:main"),
            resolve(&second, &spec, "c-main-1")
        );
        let moved = moved.unwrap();

        assert_ne!(moved, shared);
        assert_eq!(reused.unwrap(), shared);
        assert_eq!(checked_out(&moved), "c-main-2");

        let offline = resolver(ResolutionMode::Offline, temp.path(), &vcs);
        assert_eq!(resolve(&offline, &spec, "branch:main").await.unwrap(), moved);
        assert_eq!(resolve(&offline, &spec, "c-main-1").await.unwrap(), shared);
    }

    #[tokio::test]
    async fn exact_tag_with_content_root() {
        let temp = TempDir::new().unwrap();
        let spec = RepositorySpec::new(VcsKind::Git, REPO, "lib").unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());

        let online = resolver(ResolutionMode::Online, temp.path(), &vcs);
        let content = resolve(&online, &spec, "v1.2.0").await.unwrap();
        let checkout = content.parent().unwrap().to_path_buf();
        assert!(content.ends_with("lib"));
        assert_eq!(checked_out(&checkout), "v1.2.0");

        let persistent = PersistentMetadataCache::new(CacheLayout::new(temp.path()));
        let entry = persistent
            .get(&CacheKey::new(&spec, &constraint("v1.2.0")))
            .await
            .unwrap();
        assert_eq!(entry.working_dir, checkout);
        assert_eq!(entry.selected_version, ResolvedVersion::exact("v1.2.0"));

        let offline_vcs = Arc::new(FakeVcs::new());
        let offline = resolver(ResolutionMode::Offline, temp.path(), &offline_vcs);
        assert_eq!(resolve(&offline, &spec, "v1.2.0").await.unwrap(), content);
        assert_eq!(offline_vcs.total_calls(), 0);
    }

    #[tokio::test]
    async fn content_roots_share_one_checkout() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let resolver = resolver(ResolutionMode::Online, temp.path(), &vcs);

        let lib = resolve(&resolver, &spec(REPO).with_root("lib").unwrap(), "v1.0.0")
            .await
            .unwrap();
        let src = resolve(&resolver, &spec(REPO).with_root("src").unwrap(), "v1.0.0")
            .await
            .unwrap();

        assert_ne!(lib, src);
        assert_eq!(lib.parent(), src.parent());
        assert_eq!(vcs.checkout_calls(), 1);
        assert_eq!(vcs.reset_calls(), 1);
    }

    #[tokio::test]
    async fn vcs_failures_are_not_cached() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let resolver = resolver(ResolutionMode::Online, temp.path(), &vcs);

        vcs.fail_access(true);
        let err = resolve(&resolver, &spec(REPO), "latest").await.unwrap_err();
        assert!(err.is_vcs_failure());
        assert!(resolver.persistent_cache().entries().await.unwrap().is_empty());
        assert!(resolver.memory_cache().is_empty());

        vcs.fail_access(false);
        let dir = resolve(&resolver, &spec(REPO), "latest").await.unwrap();
        assert_eq!(checked_out(&dir), "c-main-1");
        assert_eq!(vcs.list_calls(), 2);
    }

    #[tokio::test]
    async fn missing_version_is_reported() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let resolver = resolver(ResolutionMode::Online, temp.path(), &vcs);

        let err = resolve(&resolver, &spec(REPO), "3.+").await.unwrap_err();
        match err {
            VcsError::NoMatchingVersion { available, .. } => {
                assert!(available.contains("v2.0.0"), "{}", available)
            }
            other => panic!("unexpected error: {}", other),
        }

        let err = resolve(&resolver, &spec(REPO), "branch:gone").await.unwrap_err();
        assert!(matches!(err, VcsError::VcsContent { .. }));
        assert_eq!(vcs.checkout_calls(), 0);
    }

    #[tokio::test]
    async fn failed_checkout_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let resolver = resolver(ResolutionMode::Online, temp.path(), &vcs);

        vcs.hang_checkout(true);
        let attempt = tokio::time::timeout(
            Duration::from_millis(200),
            resolve(&resolver, &spec(REPO), "v1.0.0"),
        )
        .await;
        assert!(attempt.is_err(), "checkout should still be running");

        assert_eq!(vcs.checkout_calls(), 1);
        assert!(staging_cleared(temp.path()).await);
        assert!(resolver.persistent_cache().entries().await.unwrap().is_empty());

        vcs.hang_checkout(false);
        let dir = resolve(&resolver, &spec(REPO), "v1.0.0").await.unwrap();
        assert_eq!(checked_out(&dir), "v1.0.0");
        assert!(!dir.join("partial").exists());
    }

    #[tokio::test]
    async fn corrupt_entry_is_resolved_again() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let layout = CacheLayout::new(temp.path());
        let key = CacheKey::new(&spec(REPO), &constraint("v1.0.0"));

        let entry = layout.entry_path(&key);
        std::fs::create_dir_all(entry.parent().unwrap()).unwrap();
        std::fs::write(&entry, "{\"repository\": 42").unwrap();

        let offline = resolver(ResolutionMode::Offline, temp.path(), &vcs);
        assert!(matches!(
            resolve(&offline, &spec(REPO), "v1.0.0").await,
            Err(VcsError::OfflineResolution { .. })
        ));

        let online = resolver(ResolutionMode::Online, temp.path(), &vcs);
        let dir = resolve(&online, &spec(REPO), "v1.0.0").await.unwrap();
        assert_eq!(vcs.checkout_calls(), 1);

        let persistent = PersistentMetadataCache::new(layout);
        assert_eq!(persistent.get(&key).await.unwrap().working_dir, dir);
    }

    #[tokio::test]
    async fn resolve_all_keeps_request_order() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let resolver = resolver(ResolutionMode::Online, temp.path(), &vcs);

        let requests: Vec<_> = ["v1.0.0", "branch:missing", "latest"]
            .into_iter()
            .map(|text| {
                ResolveRequest::new(
                    ModuleSelector::for_repository(&spec(REPO), text),
                    spec(REPO),
                    constraint(text),
                )
            })
            .collect();

        let results = resolver.resolve_all(&requests).await;

        assert_eq!(results.len(), 3);
        assert_eq!(checked_out(results[0].as_ref().unwrap()), "v1.0.0");
        assert!(results[1].is_err());
        assert_eq!(checked_out(results[2].as_ref().unwrap()), "c-main-1");
    }

    #[tokio::test]
    async fn unregistered_kind_is_rejected() {
        let temp = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::with_releases());
        let resolver = resolver(ResolutionMode::Online, temp.path(), &vcs);
        let hg = RepositorySpec::new(VcsKind::Mercurial, "https://example/hg", "").unwrap();

        let err = resolve(&resolver, &hg, "1.0").await.unwrap_err();
        assert!(matches!(err, VcsError::UnsupportedVcs(_)));
        assert_eq!(vcs.total_calls(), 0);
    }
}
