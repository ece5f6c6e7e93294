//! Conversions between 1D and 3D neuron coordinates.
//!
//! Layers address their neurons either by a flat index (fully-connected and
//! softmax layers) or by an (x, y, z) triple (input, convolutional and
//! max-pooling layers, where x and y span the image plane and z indexes
//! depth/feature maps). Adjacent layers of different dimensionality bridge
//! through these conversions, so every layer stores its scratch arrays in
//! this one canonical flat order.

/// x coordinate of a flat index.
pub fn coord_x(index: usize, dim_x: usize) -> usize {
    index % dim_x
}

/// y coordinate of a flat index.
pub fn coord_y(index: usize, dim_x: usize, dim_y: usize) -> usize {
    (index / dim_x) % dim_y
}

/// z coordinate of a flat index.
pub fn coord_z(index: usize, dim_x: usize, dim_y: usize) -> usize {
    index / (dim_x * dim_y)
}

/// Flat index of an (x, y, z) coordinate.
pub fn flat_index(x: usize, y: usize, z: usize, dim_x: usize, dim_y: usize) -> usize {
    (dim_x * dim_y * z) + (dim_x * y) + x
}
