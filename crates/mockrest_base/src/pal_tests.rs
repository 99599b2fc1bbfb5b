/* 📖 # PAL trait tests

Behaviour every Pal implementation must share, exercised through the trait and
through PalHandle: default methods built on read_file/create_file, error mapping
for missing files, and file paths as map keys.
*/

#[cfg(test)]
mod pal_trait_tests {
    use crate::error::ErrorKind;
    use crate::pal::{FilePath, MockPal, Pal, PalHandle};

    #[test]
    fn test_pal_handle_deref() {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("db.json"), b"{}".to_vec());

        let handle = PalHandle::new(mock);
        let clone = handle.clone();
        assert!(clone.file_exists(&FilePath::from("db.json")).unwrap());
    }

    #[test]
    fn test_read_file_to_string_invalid_utf8() {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("bad.html"), vec![0xFF, 0xFE]);

        let result = mock.read_file_to_string(&FilePath::from("bad.html"));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_file_error_with_path() {
        let mock = MockPal::new();
        let error = mock
            .read_file_to_string(&FilePath::from("views/missing.html"))
            .unwrap_err();

        match error.kind() {
            ErrorKind::FileError { path, .. } => {
                assert_eq!(path.to_string_lossy(), "views/missing.html")
            }
            other => panic!("Expected FileError, got {:?}", other),
        }
    }

    #[test]
    fn test_write_then_read_through_trait_object() {
        let pal: Box<dyn Pal> = Box::new(MockPal::new());
        pal.write_file(&FilePath::from("db.json"), b"{\"posts\":[]}")
            .unwrap();

        let content = pal.read_file_to_string(&FilePath::from("db.json")).unwrap();
        assert_eq!(content, "{\"posts\":[]}");
    }

    #[test]
    fn test_handles_share_state() {
        let mock = MockPal::new();
        let pal1 = PalHandle::new(mock.clone());
        let pal2 = PalHandle::new(mock);

        pal1.write_file(&FilePath::from("db.json"), b"{}").unwrap();
        assert!(pal2.file_exists(&FilePath::from("db.json")).unwrap());
    }
}

#[cfg(test)]
mod filepath_tests {
    use crate::pal::FilePath;
    use std::collections::HashMap;
    use std::path::Path;

    #[test]
    fn test_filepath_from_str() {
        let path = FilePath::from("views/posts/list.html");
        assert_eq!(path.as_path(), Path::new("views/posts/list.html"));
        assert_eq!(path.as_relative().as_str(), "views/posts/list.html");
    }

    #[test]
    fn test_filepath_from_path() {
        let path = FilePath::from(Path::new("db.json"));
        assert_eq!(path, FilePath::from("db.json"));
    }

    #[test]
    fn test_filepath_as_map_key() {
        let mut map = HashMap::new();
        map.insert(FilePath::from("a.json"), 1);
        map.insert(FilePath::from("b.json"), 2);
        map.insert(FilePath::from("a.json"), 3);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&FilePath::from("a.json")), Some(&3));
    }
}
