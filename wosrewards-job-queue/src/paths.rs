//! Output directory layout and result path relativization.

use std::path::{Component, Path, PathBuf};

/// Per-job output directory under the shared output root.
#[inline]
pub fn job_output_dir(root: &Path, job_id: i64) -> PathBuf {
    root.join(format!("job_{job_id}"))
}

/// Expresses `path` relative to `root` with forward slashes when it lies
/// under the root; otherwise returns `path` unchanged.
///
/// Both paths are normalised before comparison, so `..` segments can never
/// produce a relative result that escapes the root.
pub fn relativize(path: &Path, root: &Path) -> String {
    // Resolved paths catch symlinked roots; lexical ones cover files that do not exist.
    let candidates = [
        (std::fs::canonicalize(path).ok(), std::fs::canonicalize(root).ok()),
        (Some(lexical_absolute(path)), Some(lexical_absolute(root))),
    ];
    for (path_abs, root_abs) in candidates {
        let (Some(path_abs), Some(root_abs)) = (path_abs, root_abs) else {
            continue;
        };
        if let Ok(rel) = path_abs.strip_prefix(&root_abs) {
            let parts: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            if !parts.is_empty() {
                return parts.join("/");
            }
        }
    }
    path.to_string_lossy().into_owned()
}

fn lexical_absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_under_root_is_relative() {
        assert_eq!(
            relativize(
                Path::new("/srv/jobs_data/job_1/status.csv"),
                Path::new("/srv/jobs_data")
            ),
            "job_1/status.csv"
        );
        assert_eq!(
            relativize(
                Path::new("/srv/jobs_data/./job_2/../job_2/shot.png"),
                Path::new("/srv/jobs_data/")
            ),
            "job_2/shot.png"
        );
    }

    #[test]
    fn traversal_out_of_root_keeps_raw_path() {
        let raw = "/srv/jobs_data/job_1/../../etc/passwd";
        assert_eq!(relativize(Path::new(raw), Path::new("/srv/jobs_data")), raw);
    }

    #[test]
    fn sibling_with_shared_prefix_is_outside() {
        let raw = "/srv/jobs_data_old/job_1/status.csv";
        assert_eq!(relativize(Path::new(raw), Path::new("/srv/jobs_data")), raw);
    }

    #[test]
    fn root_itself_is_not_a_relative_result() {
        assert_eq!(
            relativize(Path::new("/srv/jobs_data"), Path::new("/srv/jobs_data")),
            "/srv/jobs_data"
        );
    }

    #[test]
    fn relative_root_matches_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let job_dir = job_output_dir(dir.path(), 3);
        std::fs::create_dir_all(&job_dir).unwrap();
        let file = job_dir.join("task_status.csv");
        std::fs::write(&file, "player_id,status\n").unwrap();

        assert_eq!(relativize(&file, dir.path()), "job_3/task_status.csv");
    }

    #[test]
    fn output_dir_layout() {
        assert_eq!(
            job_output_dir(Path::new("jobs_data"), 12),
            PathBuf::from("jobs_data/job_12")
        );
    }
}
