#![allow(dead_code)]

use std::fs::{create_dir_all, remove_file, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PACKAGE_NAME: &str = "zipflow";

fn out_dir() -> PathBuf {
    let out_dir = Path::new("/tmp").join(PACKAGE_NAME).join("tests");
    if !out_dir.exists() {
        create_dir_all(&out_dir).unwrap_or_else(|error| {
            panic!("creating dir {:?} failed, because {:?}", &out_dir, error);
        });
    }
    out_dir
}

pub fn create_new_clean_file(file_name: &str) -> (PathBuf, File) {
    let out_path = out_dir().join(file_name);

    if out_path.exists() {
        remove_file(&out_path).unwrap_or_else(|error| {
            panic!("deleting file {:?} failed, because {:?}", &out_path, error);
        });
    }
    let file = File::create(&out_path).unwrap_or_else(|error| {
        panic!("creating file {:?} failed, because {:?}", &out_path, error);
    });

    (out_path, file)
}

/// Materialize a payload on disk so the path-appending flows have a real
/// file to open and stat.
pub fn write_fixture_file(file_name: &str, payload: &[u8]) -> PathBuf {
    let (path, mut file) = create_new_clean_file(file_name);
    file.write_all(payload).unwrap();
    file.flush().unwrap();
    path
}

pub fn lorem() -> Vec<u8> {
    b"Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod \
tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, \
quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo \
consequat. Duis aute irure dolor in reprehenderit in voluptate velit esse \
cillum dolore eu fugiat nulla pariatur.\n"
        .repeat(20)
}
