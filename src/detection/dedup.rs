use crate::models::DetectedObject;

fn sort_by_box_area(objects: Vec<DetectedObject>) -> Vec<DetectedObject> {
    let mut objects = objects;
    // Stable: equal areas keep extraction order.
    objects.sort_by(|a, b| b.bounding_box.area().cmp(&a.bounding_box.area()));
    objects
}

/// Remove nested or overlapping detections of the same item.
///
/// Candidates are visited largest box first; one is kept only if its box does
/// not overlap any already-kept box by at least `overlap_ratio` of the smaller
/// box's area.
pub fn dedup_objects(objects: Vec<DetectedObject>, overlap_ratio: f64) -> Vec<DetectedObject> {
    let mut kept: Vec<DetectedObject> = Vec::new();
    for candidate in sort_by_box_area(objects) {
        let duplicate = kept.iter().any(|existing| {
            candidate
                .bounding_box
                .significantly_overlaps(&existing.bounding_box, overlap_ratio)
        });
        if !duplicate {
            kept.push(candidate);
        }
    }
    kept
}
