use std::path::{Path, PathBuf};

/// Planning requests found under `path`, recursively when it is a folder.
pub fn request_files(path: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = read_folder(path)?;
    files.retain(|path| path.extension().is_some_and(|ext| ext == "json"));
    Ok(files)
}

pub fn read_folder(folder_path: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder_path)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        } else if path.is_dir() {
            files.extend(read_folder(&path)?);
        }
    }

    files.sort();

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_files() {
        let folder = std::env::temp_dir().join(format!("courier-requests-{}", std::process::id()));
        std::fs::create_dir_all(folder.join("north")).unwrap();
        std::fs::write(folder.join("brussels.json"), "{}").unwrap();
        std::fs::write(folder.join("notes.txt"), "").unwrap();
        std::fs::write(folder.join("north/antwerp.json"), "{}").unwrap();

        let files = request_files(&folder).unwrap();
        std::fs::remove_dir_all(&folder).unwrap();

        assert_eq!(
            files,
            vec![folder.join("brussels.json"), folder.join("north/antwerp.json")]
        );
    }
}
