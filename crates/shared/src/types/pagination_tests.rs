use super::*;

#[test]
fn test_page_request_default() {
    let request = PageRequest::default();
    assert_eq!(request.page, 1);
    assert_eq!(request.page_size, 20);
}

#[test]
fn test_page_request_offset() {
    assert_eq!(PageRequest::new(1, 20).offset(), 0);
    assert_eq!(PageRequest::new(2, 20).offset(), 20);
    assert_eq!(PageRequest::new(3, 7).offset(), 14);
}

#[test]
fn test_page_request_validate() {
    assert!(PageRequest::new(1, 20).validate(200).is_ok());
    assert!(PageRequest::new(0, 20).validate(200).is_err());
    assert!(PageRequest::new(1, 0).validate(200).is_err());
    assert!(PageRequest::new(1, 201).validate(200).is_err());
    assert!(PageRequest::new(1, 200).validate(200).is_ok());
}

#[test]
fn test_page_meta_pagination() {
    // 25 items, 10 per page -> 3 pages
    let meta = PageMeta::new(PageRequest::new(1, 10), 25);
    assert_eq!(meta.total_pages, 3);
    assert_eq!(meta.total_records, 25);

    let meta = PageMeta::new(PageRequest::new(1, 5), 25);
    assert_eq!(meta.total_pages, 5);
}

#[test]
fn test_page_meta_empty() {
    let meta = PageMeta::new(PageRequest::new(1, 10), 0);
    assert_eq!(meta.total_pages, 0);
    assert_eq!(meta.total_records, 0);
    assert_eq!(meta.page, 1);
}
