#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// A stand-in engine honouring the command-line contract: it runs inside the
/// workspace root, reads from the staging area and writes the artifact and an
/// optional stats report where the real engine would. Every call is appended
/// to `calls.log`.
pub const CONTRACT_ENGINE: &str = r#"
echo "$@" >> calls.log
name="$1"
mode="$2"
stats=0
for arg in "$@"; do
    if [ "$arg" = "--stats" ]; then stats=1; fi
done
case "$mode" in
    --compress)
        src="inputs/$name"
        cp "$src" "outputs/$name.lzw" || exit 1
        ;;
    --decompress)
        src="outputs/$name"
        cp "$src" "inputs/${name%????}" || exit 1
        ;;
    *)
        echo "unknown mode $mode" >&2
        exit 2
        ;;
esac
if [ "$stats" = 1 ]; then
    printf 'Input: %s\nMode: %s\nInput size: %s bytes\n' "$name" "$mode" "$(wc -c < "$src" | tr -d ' ')" > "stats/$name.stats"
fi
"#;

pub const FAILING_ENGINE: &str = r#"
echo "$@" >> calls.log
echo "bad table" >&2
exit 1
"#;

#[cfg(unix)]
pub fn write_engine(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("engine.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("engine script");
    let mut perms = fs::metadata(&path).expect("meta").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path
}
