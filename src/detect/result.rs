/// Axis-aligned bounding box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    pub fn clamp_to(&self, width: u32, height: u32) -> BBox {
        let w = width as f32;
        let h = height as f32;
        BBox {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

/// One detector hit.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub category: ObjectCategory,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BBox, category: ObjectCategory, confidence: f32) -> Self {
        Self {
            bbox,
            category,
            confidence,
        }
    }

    pub fn is_person(&self) -> bool {
        self.category == ObjectCategory::Person
    }
}

/// Detection category. Only `Person` is pose-estimated; everything else is
/// carried through untouched so per-detection indexing stays aligned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectCategory {
    Person,
    /// Any other COCO class, by class index.
    Other(u16),
}

impl ObjectCategory {
    pub fn from_coco_index(index: usize) -> Self {
        match index {
            0 => Self::Person,
            other => Self::Other(other as u16),
        }
    }

    pub fn coco_index(self) -> usize {
        match self {
            Self::Person => 0,
            Self::Other(index) => index as usize,
        }
    }

    pub fn name(self) -> &'static str {
        COCO_CATEGORY
            .get(self.coco_index())
            .copied()
            .unwrap_or("unknown")
    }
}

pub const COCO_CATEGORY: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];
