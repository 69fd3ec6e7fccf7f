// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The package builder: the per-step operations of an install run.
//!
//! Every step works inside the run's private scratch directories. Only
//! `update` and `install` reach system package state, and only through the
//! privileged worker.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plugind_core::{PlugindError, PrivilegedWorker};
use plugind_plugin::RawMetadata;
use plugind_plugin::metadata::check_key;
use tracing::Level;

use crate::context::InstallContext;
use crate::debian::{DescriptorGenerator, DescriptorVars};
use crate::fetch::{Fetcher, remove_dir_if_exists};
use crate::shell::ShellCommand;
use crate::validator::Validator;

pub struct PackageBuilder {
    fetcher: Arc<dyn Fetcher>,
    validator: Validator,
    generator: Arc<dyn DescriptorGenerator>,
    worker: Arc<dyn PrivilegedWorker>,
}

impl PackageBuilder {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        validator: Validator,
        generator: Arc<dyn DescriptorGenerator>,
        worker: Arc<dyn PrivilegedWorker>,
    ) -> Self {
        Self {
            fetcher,
            validator,
            generator,
            worker,
        }
    }

    pub async fn download(&self, ctx: &mut InstallContext) -> Result<(), PlugindError> {
        ctx.log(Level::INFO, format_args!("downloading {:?}", ctx.request));
        let path = self.fetcher.fetch(ctx).await?;
        ctx.set_download_path(path);
        Ok(())
    }

    /// Moves the download into `<extract_dir>/<uuid>`, replacing anything
    /// already there, and reads the metadata file.
    pub async fn extract(&self, ctx: &mut InstallContext) -> Result<(), PlugindError> {
        let download_path = ctx.download_path()?.clone();
        let extract_path = ctx.config.paths.extract_dir.join(ctx.uuid.to_string());
        ctx.log(
            Level::DEBUG,
            format_args!("extracting {} to {}", download_path.display(), extract_path.display()),
        );

        remove_dir_if_exists(&extract_path).await?;
        tokio::fs::create_dir_all(&ctx.config.paths.extract_dir)
            .await
            .map_err(|e| PlugindError::io("failed to create the extract directory", e))?;
        move_dir(&download_path, &extract_path).await?;

        let metadata_path = extract_path.join(&ctx.config.build.metadata_filename);
        let raw = RawMetadata::read(&metadata_path)?;
        ctx.set_extracted(extract_path, raw);
        Ok(())
    }

    pub async fn validate(&self, ctx: &mut InstallContext) -> Result<(), PlugindError> {
        let metadata = self.validator.validate(ctx.raw_metadata()?).await?;
        ctx.set_metadata(metadata);
        Ok(())
    }

    /// Runs `<rules> build` inside the extracted tree.
    pub async fn build(&self, ctx: &mut InstallContext) -> Result<(), PlugindError> {
        let metadata = ctx.metadata()?;
        check_key(&metadata.namespace, &metadata.name)?;
        let extract_path = ctx.extract_path()?.clone();
        let installer_path = extract_path.join(&ctx.config.build.install_filename);

        ctx.log(
            Level::DEBUG,
            format_args!("building {}/{}", metadata.namespace, metadata.name),
        );
        ShellCommand::new(&installer_path)
            .arg("build")
            .current_dir(&extract_path)
            .run(ctx.uuid)
            .await?;
        ctx.set_installer_path(installer_path);
        Ok(())
    }

    /// Stages the package tree and builds the native archive.
    pub async fn package(&self, ctx: &mut InstallContext) -> Result<(), PlugindError> {
        let metadata = ctx.metadata()?.clone();
        let extract_path = ctx.extract_path()?.clone();
        let installer_path = ctx.installer_path()?.clone();
        let build = &ctx.config.build;
        let pkgdir = extract_path.join(&build.build_dir);
        ctx.log(
            Level::DEBUG,
            format_args!("packaging {}/{}", metadata.namespace, metadata.name),
        );

        tokio::fs::create_dir_all(&pkgdir)
            .await
            .map_err(|e| PlugindError::io(format!("failed to create {}", pkgdir.display()), e))?;
        ShellCommand::wrapped(&build.fakeroot, &installer_path)
            .arg("package")
            .current_dir(&extract_path)
            .env("pkgdir", &pkgdir)
            .run(ctx.uuid)
            .await?;

        let installed_data_path = staged_path(&pkgdir, &ctx.config.paths.metadata_dir)
            .join(&metadata.namespace)
            .join(&metadata.name);
        tokio::fs::create_dir_all(&installed_data_path)
            .await
            .map_err(|e| PlugindError::io(format!("failed to create {}", installed_data_path.display()), e))?;
        ShellCommand::wrapped(&build.fakeroot, "cp")
            .arg("-R")
            .arg(extract_path.join(&build.plugin_data_dir))
            .arg(&installed_data_path)
            .current_dir(&extract_path)
            .run(ctx.uuid)
            .await?;

        let vars = DescriptorVars::new(&ctx.config, &metadata);
        self.generator.generate(&vars, &pkgdir)?;

        ShellCommand::new(&build.deb_builder)
            .arg("--build")
            .arg(&pkgdir)
            .current_dir(&extract_path)
            .run(ctx.uuid)
            .await?;

        let package_path = extract_path.join(format!("{}.deb", build.build_dir));
        ctx.set_package_path(package_path);
        Ok(())
    }

    /// Refreshes the package index when the plugin declares native dependencies.
    pub async fn update(&self, ctx: &mut InstallContext) -> Result<(), PlugindError> {
        if ctx.metadata()?.debian_depends.is_empty() {
            return Ok(());
        }
        ctx.log(Level::DEBUG, "refreshing the package index");
        self.worker
            .refresh_index(ctx.uuid)
            .wait_success(ctx.config.worker.timeout())
            .await
    }

    pub async fn install(&self, ctx: &mut InstallContext) -> Result<(), PlugindError> {
        let package_path = ctx.package_path()?.clone();
        ctx.log(Level::DEBUG, format_args!("installing {}", package_path.display()));
        self.worker
            .install(ctx.uuid, package_path)
            .wait_success(ctx.config.worker.timeout())
            .await
    }

    /// Removes the run's scratch directories. Never fails; safe to repeat.
    pub async fn clean(&self, ctx: &InstallContext) {
        for path in ctx.scratch_paths() {
            if let Err(e) = remove_dir_if_exists(&path).await {
                ctx.log(Level::WARN, format_args!("cleanup failed: {e}"));
            }
        }
    }
}

/// `absolute` re-rooted under `root`.
fn staged_path(root: &Path, absolute: &Path) -> PathBuf {
    root.join(absolute.strip_prefix("/").unwrap_or(absolute))
}

/// Renames `from` to `to`, copying when they sit on different filesystems.
async fn move_dir(from: &Path, to: &Path) -> Result<(), PlugindError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    let (from_owned, to_owned) = (from.to_path_buf(), to.to_path_buf());
    tokio::task::spawn_blocking(move || copy_tree(&from_owned, &to_owned))
        .await
        .map_err(|e| PlugindError::Internal(format!("copy task failed: {e}")))?
        .map_err(|e| PlugindError::io(format!("failed to move {} to {}", from.display(), to.display()), e))?;
    remove_dir_if_exists(from).await
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else if file_type.is_symlink() {
            std::os::unix::fs::symlink(std::fs::read_link(entry.path())?, &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
