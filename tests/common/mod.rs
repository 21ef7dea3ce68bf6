#![allow(dead_code)]

use std::{
    io::{Cursor, Read, Write},
    num::NonZeroU64,
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use cookiepress::{
    application::{
        generate::{ArchiveFetcher, GenerateService},
        render::NativeRenderer,
    },
    config::{FetchSettings, ResponseTransport},
    infra::http::{HttpState, build_router},
};
use cookiepress_api_types::GENERATE_PATH;
use tempfile::TempDir;
use tower::ServiceExt;
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

pub struct Harness {
    pub router: Router,
    pub workspace_root: TempDir,
}

impl Harness {
    pub fn new(transport: ResponseTransport) -> Self {
        let workspace_root = TempDir::new().expect("workspace root");
        let fetch = FetchSettings {
            default_branch: "main".to_string(),
            max_archive_bytes: NonZeroU64::new(1024 * 1024).expect("non-zero"),
            timeout: Some(Duration::from_secs(10)),
        };
        let service = GenerateService::new(
            ArchiveFetcher::new(&fetch).expect("http client"),
            Arc::new(NativeRenderer::new()),
            workspace_root.path().to_path_buf(),
            fetch.default_branch.clone(),
        );
        let router = build_router(
            HttpState::new(Arc::new(service), transport),
            MAX_REQUEST_BYTES,
        );

        Self {
            router,
            workspace_root,
        }
    }

    pub async fn post_generate(&self, body: impl Into<Body>) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(GENERATE_PATH)
            .header("content-type", "application/json")
            .body(body.into())
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Every generation must leave the workspace root as it found it.
    pub fn assert_workspaces_removed(&self) {
        let leftovers: Vec<_> = std::fs::read_dir(self.workspace_root.path())
            .expect("list workspace root")
            .map(|entry| entry.expect("entry").path())
            .collect();
        assert!(leftovers.is_empty(), "leftover workspaces: {leftovers:?}");
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf8 body")
}

pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start file");
        writer.write_all(contents.as_bytes()).expect("write file");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A GitHub-style branch archive holding a minimal cookiecutter template.
pub fn sample_template() -> Vec<u8> {
    zip_bytes(&[
        (
            "cookiecutter-demo-main/cookiecutter.json",
            r#"{
                "project_name": "My Project",
                "project_slug": "{{ cookiecutter.project_name | lower | replace(from=' ', to='_') }}",
                "license": ["MIT", "Apache-2.0"]
            }"#,
        ),
        (
            "cookiecutter-demo-main/{{cookiecutter.project_slug}}/README.md",
            "# {{ cookiecutter.project_name }}\n\nLicensed under {{ cookiecutter.license }}.\n",
        ),
        (
            "cookiecutter-demo-main/{{cookiecutter.project_slug}}/src/__init__.py",
            "",
        ),
    ])
}

pub fn zip_names(bytes: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).expect("zip");
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

pub fn zip_entry(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("zip");
    let mut contents = String::new();
    archive
        .by_name(name)
        .expect("entry")
        .read_to_string(&mut contents)
        .expect("read entry");
    contents
}
