use super::*;

#[test]
fn default_catalog_splits_levels_evenly() {
    let catalog = Catalog::default();
    assert_eq!(catalog.all().len(), 20);
    assert_eq!(catalog.by_level(ProgramLevel::Undergraduate).len(), 10);
    assert_eq!(catalog.by_level(ProgramLevel::Postgraduate).len(), 10);
}

#[test]
fn find_by_id() {
    let catalog = Catalog::default();
    let college = catalog.find("iit-delhi").unwrap();
    assert_eq!(college.name, "Indian Institute of Technology Delhi");
    assert_eq!(college.level, ProgramLevel::Undergraduate);
    assert!(catalog.find("hogwarts").is_none());
}

#[tokio::test(start_paused = true)]
async fn fetch_waits_then_filters() {
    let catalog = Catalog::with_defaults(Duration::from_millis(800));
    let start = tokio::time::Instant::now();
    let colleges = catalog.fetch(ProgramLevel::Postgraduate).await;
    assert!(start.elapsed() >= Duration::from_millis(800));
    assert_eq!(colleges.len(), 10);
    assert!(colleges.iter().all(|c| c.level == ProgramLevel::Postgraduate));
}
