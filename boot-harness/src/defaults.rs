//! Boot trace the kernel prints on a healthy single-CPU boot.
//!
//! Versioned test data: update alongside the kernel's boot messages.

pub const DEFAULT_PATTERNS: &[&str] = &[
    r"fsinit done , superblock info:",
    r"fs_name:tsunami",
    r"imap:2",
    r"inodes:6",
    r"bmap:115206",
    r"blocks:115334",
    r"max_i:32767",
    r"max_b:1163909",
    r"CPU 0 first-sche systemd",
    r"cpu0 trigger syn_syscall_u",
];

pub const DEFAULT_COMMAND: &str = "make";

pub const DEFAULT_ARGS: &[&str] = &["qemu", "CPUS=1"];
