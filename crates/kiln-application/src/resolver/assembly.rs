use super::SearchContext;
use kiln_core::artifact::{Resolution, ResolvedArtifact};
use kiln_core::{ResolutionError, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Portable executable files start with the DOS header magic.
const PE_MAGIC: &[u8; 2] = b"MZ";

/// Resolves a bare assembly path.
///
/// Absolute paths are used as-is. Relative paths are tried against the
/// working directory and then each search path; the first loadable binary wins.
pub async fn resolve_assembly(path: &Path, context: &SearchContext) -> Result<Resolution> {
    let candidates = candidate_paths(path, context);

    for candidate in &candidates {
        if is_loadable_binary(candidate).await {
            let location = tokio::fs::canonicalize(candidate)
                .await
                .unwrap_or_else(|_| candidate.clone());
            tracing::debug!("[AssemblyResolver] {} -> {:?}", path.display(), location);
            let artifact = ResolvedArtifact::assembly(location);
            let summary = format!("Added reference {}", artifact.identity.name);
            return Ok(Resolution::new(vec![artifact], summary));
        }
    }

    tracing::info!(
        "[AssemblyResolver] No loadable binary for {} in {} location(s)",
        path.display(),
        candidates.len()
    );
    Err(ResolutionError::AssemblyNotFound {
        reference: path.display().to_string(),
        searched: candidates,
    }
    .into())
}

fn candidate_paths(path: &Path, context: &SearchContext) -> Vec<PathBuf> {
    if path.is_absolute() {
        return vec![path.to_path_buf()];
    }
    std::iter::once(context.working_directory.join(path))
        .chain(
            context
                .search_paths
                .iter()
                .map(|dir| context.absolutize(dir).join(path)),
        )
        .collect()
}

async fn is_loadable_binary(path: &Path) -> bool {
    let Ok(mut file) = tokio::fs::File::open(path).await else {
        return false;
    };
    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic).await {
        Ok(_) => &magic == PE_MAGIC,
        Err(_) => false,
    }
}
