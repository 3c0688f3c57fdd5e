//! `.gdbinit` rendering

use std::fmt::Write;

use crate::macros::CacheSizes;

/// Where gdb should find the kernel
#[derive(Debug, Clone)]
pub struct Target {
    pub remote: String,
    pub symbol_file: String,
}

/// A helper that walks one fixed-size kernel cache and prints live entries
struct CacheWalker {
    command: &'static str,
    cache: &'static str,
    array: &'static str,
    elem_type: &'static str,
    var: &'static str,
    bound: fn(&CacheSizes) -> u64,
}

impl CacheSizes {
    fn niobuf(&self) -> u64 {
        self.niobuf
    }
    fn nfile(&self) -> u64 {
        self.nfile
    }
    fn ninode(&self) -> u64 {
        self.ninode
    }
}

const WALKERS: [CacheWalker; 3] = [
    CacheWalker {
        command: "pb",
        cache: "bcache",
        array: "bufs",
        elem_type: "buf",
        var: "buf",
        bound: CacheSizes::niobuf,
    },
    CacheWalker {
        command: "pf",
        cache: "fcache",
        array: "files",
        elem_type: "file",
        var: "file",
        bound: CacheSizes::nfile,
    },
    CacheWalker {
        command: "pi",
        cache: "icache",
        array: "inodes",
        elem_type: "inode",
        var: "inode",
        bound: CacheSizes::ninode,
    },
];

const LAYOUT_COMMANDS: &str = "\
define ls
  layout src
end

define la
  layout asm
end

define slock
  set scheduler-locking on
end

define sunlock
  set scheduler-locking off
end
";

pub fn render(sizes: &CacheSizes, target: &Target) -> String {
    let mut out = String::from(LAYOUT_COMMANDS);

    for walker in &WALKERS {
        out.push('\n');
        write_walker(&mut out, walker, (walker.bound)(sizes));
    }

    let _ = write!(
        out,
        "
set confirm off
set architecture riscv:rv64
target remote {}
symbol-file {}
set disassemble-next-line auto
set riscv use-compressed-breakpoints yes
",
        target.remote, target.symbol_file
    );
    out
}

fn write_walker(out: &mut String, w: &CacheWalker, bound: u64) {
    let ptr = format!("${}_ptr", w.cache);
    let _ = write!(
        out,
        r#"define {cmd}
  set {ptr} = (struct {ty}*)&{cache}.{array}
  set $count = 0
  set $i = 0
  while $i < {bound}
    set ${var} = &{ptr}[$i]
    if (${var}->refc != 0)
      printf "  {var}: %p, refc = %d\n", ${var}, ${var}->refc
      set $count = $count + 1
    end
    set $i = $i + 1
  end
end
"#,
        cmd = w.command,
        ptr = ptr,
        ty = w.elem_type,
        cache = w.cache,
        array = w.array,
        bound = bound,
        var = w.var,
    );
}
