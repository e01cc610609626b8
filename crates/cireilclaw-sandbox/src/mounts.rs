//! Mount table construction for the namespace jail.
//!
//! Called from `jail`'s `pre_exec` hook, after `unshare` has given the
//! forked child its own user/mount namespaces but before it execs. Builds a
//! private root under a tmpfs, binds the agent's `workspace`/`memories`/
//! `skills` directories plus a minimal slice of the host into it, then
//! `pivot_root`s into that tree so the rest of the host filesystem is
//! unreachable to the sandboxed command.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nix::unistd::{chdir, pivot_root};

const TMPFS_TMP_DATA: &str = "size=64m";
const DEV_NODES: &[&str] = &["null", "zero", "full", "random", "urandom", "tty"];
const RESOLVER_FILES: &[&str] = &[
    "/etc/passwd",
    "/etc/group",
    "/etc/nsswitch.conf",
    "/etc/resolv.conf",
];
const CA_BUNDLES: &[&str] = &[
    "/etc/ssl/certs/ca-certificates.crt",
    "/etc/pki/tls/certs/ca-bundle.crt",
    "/etc/ssl/cert.pem",
];
const SYSTEM_DIRS: &[&str] = &["/usr", "/bin", "/lib", "/lib64"];

/// Builds the jail root and `pivot_root`s into it. Must run inside the
/// forked child, after `unshare(CLONE_NEWNS | ...)`, before exec.
pub fn build_and_enter(agent_root: &Path, allowed_binaries: &[String]) -> std::io::Result<()> {
    // Don't let our mounts propagate back to the host's mount table.
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(std::io::Error::from)?;

    let new_root = PathBuf::from(format!("/tmp/.cireilclaw-jail-{}", std::process::id()));
    fs::create_dir_all(&new_root)?;
    mount_tmpfs(&new_root, TMPFS_TMP_DATA)?;

    bind_rw(&agent_root.join("workspace"), &new_root.join("workspace"))?;
    bind_rw(&agent_root.join("memories"), &new_root.join("memories"))?;
    bind_rw(&agent_root.join("skills"), &new_root.join("skills"))?;

    let tmp_dir = new_root.join("tmp");
    fs::create_dir_all(&tmp_dir)?;
    mount_tmpfs(&tmp_dir, TMPFS_TMP_DATA)?;

    let proc_dir = new_root.join("proc");
    fs::create_dir_all(&proc_dir)?;
    mount(Some("proc"), &proc_dir, Some("proc"), MsFlags::empty(), None::<&str>)
        .map_err(std::io::Error::from)?;

    let dev_dir = new_root.join("dev");
    fs::create_dir_all(&dev_dir)?;
    mount_tmpfs(&dev_dir, "mode=755")?;
    for node in DEV_NODES {
        bind_dev_node(&dev_dir, node)?;
    }

    for path in RESOLVER_FILES.iter().chain(CA_BUNDLES) {
        bind_ro_file_if_exists(Path::new(path), &new_root)?;
    }

    bind_binaries(&new_root, allowed_binaries)?;

    let old_root = new_root.join(".put_old");
    fs::create_dir_all(&old_root)?;
    pivot_root(&new_root, &old_root).map_err(std::io::Error::from)?;
    chdir("/").map_err(std::io::Error::from)?;
    umount2("/.put_old", MntFlags::MNT_DETACH).map_err(std::io::Error::from)?;
    let _ = fs::remove_dir("/.put_old");
    chdir("/workspace").map_err(std::io::Error::from)?;

    Ok(())
}

fn mount_tmpfs(target: &Path, data: &str) -> std::io::Result<()> {
    mount(Some("tmpfs"), target, Some("tmpfs"), MsFlags::empty(), Some(data)).map_err(std::io::Error::from)
}

fn bind_rw(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::create_dir_all(target)?;
    mount(Some(source), target, None::<&str>, MsFlags::MS_BIND | MsFlags::MS_REC, None::<&str>)
        .map_err(std::io::Error::from)
}

/// A read-only bind needs two mount() calls: the kernel ignores MS_RDONLY on
/// the initial MS_BIND, so a remount pass is required to make it stick.
fn bind_ro(source: &Path, target: &Path) -> std::io::Result<()> {
    mount(Some(source), target, None::<&str>, MsFlags::MS_BIND | MsFlags::MS_REC, None::<&str>)
        .map_err(std::io::Error::from)?;
    mount(
        None::<&str>,
        target,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(std::io::Error::from)
}

fn bind_dev_node(dev_dir: &Path, name: &str) -> std::io::Result<()> {
    let host_path = Path::new("/dev").join(name);
    if !host_path.exists() {
        return Ok(());
    }
    let target = dev_dir.join(name);
    fs::File::create(&target)?;
    bind_rw(&host_path, &target)
}

fn bind_ro_file_if_exists(host_path: &Path, new_root: &Path) -> std::io::Result<()> {
    if !host_path.exists() {
        return Ok(());
    }
    let relative = host_path.strip_prefix("/").unwrap_or(host_path);
    let target = new_root.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::File::create(&target)?;
    bind_ro(host_path, &target)
}

/// Binds the system binary/library closure read-only. On a store-based host
/// (`/nix/store`) the whole store is bound read-only and each allowed binary
/// gets a `/bin/{name}` symlink into it — a coarser approximation of the
/// per-binary transitive closure, since computing that closure exactly needs
/// a package database this crate has no access to. On a generic host,
/// `/usr`, `/bin`, `/lib`, `/lib64` are bound read-only wholesale.
fn bind_binaries(new_root: &Path, allowed_binaries: &[String]) -> std::io::Result<()> {
    let resolved: Vec<(String, PathBuf)> = allowed_binaries
        .iter()
        .filter_map(|name| resolve_in_path(name).map(|p| (name.clone(), p)))
        .collect();

    let bin_dir = new_root.join("bin");
    fs::create_dir_all(&bin_dir)?;

    if resolved.iter().any(|(_, p)| p.starts_with("/nix/store")) {
        let store_target = new_root.join("nix/store");
        fs::create_dir_all(&store_target)?;
        bind_ro(Path::new("/nix/store"), &store_target)?;
        for (name, real_path) in &resolved {
            if real_path.starts_with("/nix/store") {
                let _ = symlink(real_path, bin_dir.join(name));
            }
        }
        return Ok(());
    }

    for dir in SYSTEM_DIRS {
        let host_dir = Path::new(dir);
        if host_dir.exists() {
            let target = new_root.join(dir.trim_start_matches('/'));
            fs::create_dir_all(&target)?;
            bind_ro(host_dir, &target)?;
        }
    }
    Ok(())
}

fn resolve_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(name);
        candidate.canonicalize().ok().filter(|p| p.is_file())
    })
}
