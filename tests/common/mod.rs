#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::{TempDir, fixture::ChildPath, prelude::*};
use std::{fs, path::Path};

pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn write_config(&self, contents: toml::Table) {
        self.dir
            .child("svg2png.toml")
            .write_str(&contents.to_string())
            .unwrap();
    }

    pub fn read_test_asset(file_name: &str) -> Vec<u8> {
        let path = Path::new("tests").join("assets").join(file_name);
        fs::read(&path).unwrap()
    }

    pub fn add_file(&self, file_name: &str) -> ChildPath {
        self.add_file_at(&format!("input/{file_name}"), file_name)
    }

    pub fn add_file_at(&self, dest: &str, file_name: &str) -> ChildPath {
        let file = self.dir.child(dest);
        file.write_binary(&Self::read_test_asset(file_name)).unwrap();
        file
    }

    pub fn run(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!();
        cmd.env_remove("SVG2PNG_MAX_PIXELS");
        cmd.current_dir(self.dir.path());
        cmd
    }
}

pub fn decode(path: &Path) -> image::RgbaImage {
    image::open(path).unwrap().to_rgba8()
}
