index_vec::define_index_type! {
    /// The index of a partition within a pipeline.
    pub struct Partition = u32;

    DISPLAY_FORMAT = "{}";
}

pub type Partitioned<T> = index_vec::IndexVec<Partition, T>;
