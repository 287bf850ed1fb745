#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const GI_COMBO: &str = "p31720429_190000_Linux-x86-64.zip";
pub const GUESSED_COMBO: &str = "p35742413_190000_Linux-x86-64.zip";

pub fn write_zip(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (entry, body) in files {
        zip.start_file(*entry, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap();
    path
}

/// 19.9 GI combo: OJVM README in one subdir, GI bundle.xml and README in the other.
pub fn gi_combo(dir: &Path) -> PathBuf {
    write_zip(
        dir,
        GI_COMBO,
        &[
            (
                "PatchSearch.xml",
                br#"<?xml version="1.0" encoding="UTF-8"?>
<results><patch>
  <name>31720429</name>
  <abstract><![CDATA[COMBO OF OJVM RU COMPONENT 19.9.0.0.201020 + GI RU 19.9.0.0.201020]]></abstract>
  <release id="600000000073715" name="19.0.0.0.0" platform="226"/>
</patch></results>"#,
            ),
            ("31720429/README.html", b"<html><body><p>Combo patch</p></body></html>"),
            (
                "31720429/31668882/README.html",
                b"<html><head><title>Oracle JavaVM Component Release Update 19.9.0.0.201020</title></head>\
                  <body><p>Apply this OJVM patch after the Release Update.</p></body></html>",
            ),
            ("31720429/31668882/etc/config/inventory.xml", b"<inventory/>"),
            (
                "31720429/31750108/bundle.xml",
                br#"<bundle name="GI Release Update 19.9.0.0.201020" version="19.9.0.0.201020"><subpatch location="31771877"/></bundle>"#,
            ),
            (
                "31720429/31750108/README.txt",
                b"Grid Infrastructure Release Update 19.9.0.0.201020\n",
            ),
            ("31720429/31750108/31771877/files/x", b"binary"),
        ],
    )
}

/// Combo whose component READMEs carry no family markers at all.
pub fn guessed_combo(dir: &Path) -> PathBuf {
    write_zip(
        dir,
        GUESSED_COMBO,
        &[
            (
                "PatchSearch.xml",
                br#"<results><patch><abstract>COMBO OF OJVM RU COMPONENT 19.21.0.0.231017 + GI RU 19.21.0.0.231017</abstract><release name="19.0.0.0.0"/></patch></results>"#,
            ),
            ("35742413/35642822/README.txt", b"Release Update 19.21.0.0.231017\n"),
            ("35742413/35738010/README.txt", b"Release Update 19.21.0.0.231017\n"),
        ],
    )
}

pub fn three_components(dir: &Path) -> PathBuf {
    write_zip(
        dir,
        "p34773504_190000_Linux-x86-64.zip",
        &[
            ("34773504/34765931/README.txt", b"Database Release Update 19.18.0.0.230117"),
            ("34773504/34786990/README.txt", b"OJVM Release Update 19.18.0.0.230117"),
            ("34773504/34768559/README.txt", b"OCW Release Update 19.18.0.0.230117"),
        ],
    )
}

pub fn no_components(dir: &Path) -> PathBuf {
    write_zip(
        dir,
        "p6880880_190000_Linux-x86-64.zip",
        &[
            ("OPatch/opatch", b"#!/bin/sh"),
            ("OPatch/README.txt", b"OPatch 12.2.0.1.40"),
        ],
    )
}

/// Combo where only the GI side names its family; nothing says OJVM.
pub fn gi_marked_combo(dir: &Path) -> PathBuf {
    write_zip(
        dir,
        GUESSED_COMBO,
        &[
            (
                "PatchSearch.xml",
                br#"<results><patch><abstract>COMBO OF OJVM RU COMPONENT 19.21.0.0.231017 + GI RU 19.21.0.0.231017</abstract><release name="19.0.0.0.0"/></patch></results>"#,
            ),
            ("35742413/35642822/README.txt", b"Release Update 19.21.0.0.231017\n"),
            (
                "35742413/35738010/README.txt",
                b"Grid Infrastructure Release Update 19.21.0.0.231017\n",
            ),
        ],
    )
}
