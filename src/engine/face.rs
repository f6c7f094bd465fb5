use cgmath::Vector3;
use strum_macros::EnumIter;

/// Face of a unit cube. The declaration order is the order of per-face texture tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum FaceDirection {
    Top,
    Bottom,
    West,
    East,
    South,
    North,
}

impl FaceDirection {
    pub fn from_dir(dir: &Vector3<i32>) -> Option<Self> {
        match (dir.x, dir.y, dir.z) {
            (0, 1, 0) => Some(FaceDirection::Top),
            (0, -1, 0) => Some(FaceDirection::Bottom),
            (-1, 0, 0) => Some(FaceDirection::West),
            (1, 0, 0) => Some(FaceDirection::East),
            (0, 0, 1) => Some(FaceDirection::South),
            (0, 0, -1) => Some(FaceDirection::North),
            _ => None,
        }
    }

    pub fn as_dir(&self) -> Vector3<i32> {
        match self {
            FaceDirection::Top => Vector3::new(0, 1, 0),
            FaceDirection::Bottom => Vector3::new(0, -1, 0),
            FaceDirection::West => Vector3::new(-1, 0, 0),
            FaceDirection::East => Vector3::new(1, 0, 0),
            FaceDirection::South => Vector3::new(0, 0, 1),
            FaceDirection::North => Vector3::new(0, 0, -1),
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(FaceDirection::Top),
            1 => Some(FaceDirection::Bottom),
            2 => Some(FaceDirection::West),
            3 => Some(FaceDirection::East),
            4 => Some(FaceDirection::South),
            5 => Some(FaceDirection::North),
            _ => None,
        }
    }

    pub fn as_index(&self) -> usize {
        match self {
            FaceDirection::Top => 0,
            FaceDirection::Bottom => 1,
            FaceDirection::West => 2,
            FaceDirection::East => 3,
            FaceDirection::South => 4,
            FaceDirection::North => 5,
        }
    }

    /// Directional shading multiplier applied on top of vertex light.
    pub fn shading(&self) -> f32 {
        match SideDirection::from(*self) {
            SideDirection::Top => 1.0,
            SideDirection::Bottom => 0.3,
            SideDirection::Side => 0.7,
        }
    }

    /// Unit-cube corners of the face, in emission order. Triangulated as `0,1,2` and `2,3,0`.
    pub fn corners(&self) -> [[u8; 3]; 4] {
        match self {
            FaceDirection::Top => [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]],
            FaceDirection::Bottom => [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]],
            FaceDirection::West => [[0, 0, 0], [0, 1, 0], [0, 1, 1], [0, 0, 1]],
            FaceDirection::East => [[1, 0, 0], [1, 0, 1], [1, 1, 1], [1, 1, 0]],
            FaceDirection::South => [[0, 0, 1], [0, 1, 1], [1, 1, 1], [1, 0, 1]],
            FaceDirection::North => [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]],
        }
    }

    /// Texture coordinates matching `corners`.
    pub fn uvs(&self) -> [[f32; 2]; 4] {
        match self {
            FaceDirection::Top => [[1.0, 1.0], [1.0, 0.0], [0.0, 0.0], [0.0, 1.0]],
            FaceDirection::Bottom => [[1.0, 0.0], [0.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            FaceDirection::West => [[1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]],
            FaceDirection::East => [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            FaceDirection::South => [[1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]],
            FaceDirection::North => [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]],
        }
    }

    /// The two axes spanning the face plane, as indices into `[x, y, z]`.
    pub fn tangent_axes(&self) -> (usize, usize) {
        match self {
            FaceDirection::Top | FaceDirection::Bottom => (0, 2),
            FaceDirection::West | FaceDirection::East => (1, 2),
            FaceDirection::South | FaceDirection::North => (0, 1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum SideDirection {
    Top,
    Bottom,
    Side,
}

impl From<FaceDirection> for SideDirection {
    fn from(val: FaceDirection) -> Self {
        match val {
            FaceDirection::Top => SideDirection::Top,
            FaceDirection::Bottom => SideDirection::Bottom,
            FaceDirection::West | FaceDirection::East | FaceDirection::South | FaceDirection::North => {
                SideDirection::Side
            }
        }
    }
}
