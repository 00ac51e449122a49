// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

/// ScanNet v2 instance classes in logit order. The final entry is the
/// "no instance" slot which is never emitted as a label.
pub const SCANNET_CLASSES: [&str; 19] = [
    "cabinet",
    "bed",
    "chair",
    "sofa",
    "table",
    "door",
    "window",
    "bookshelf",
    "picture",
    "counter",
    "desk",
    "curtain",
    "refrigerator",
    "shower curtain",
    "toilet",
    "sink",
    "bathtub",
    "otherfurniture",
    "no instance",
];

/// Number of scored ScanNet classes, excluding "no instance".
pub const SCANNET_NUM_CLASSES: usize = SCANNET_CLASSES.len() - 1;

/// Name of a 1-based predicted label.
pub fn class_name(label_id: usize) -> Option<&'static str> {
    if (1..=SCANNET_NUM_CLASSES).contains(&label_id) {
        Some(SCANNET_CLASSES[label_id - 1])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name() {
        assert_eq!(SCANNET_NUM_CLASSES, 18);
        assert_eq!(class_name(1), Some("cabinet"));
        assert_eq!(class_name(18), Some("otherfurniture"));
        assert_eq!(class_name(0), None);
        assert_eq!(class_name(19), None);
    }
}
