id_type!(
    /// Identifies a data partition; unique across the cluster.
    PartitionId,
    u32
);
id_type!(
    /// Identifies a master/meta/data node.
    NodeId,
    u64
);
id_type!(
    /// Addresses one extent inside a partition's store.
    ExtentId,
    u64
);
id_type!(
    /// Correlates a request packet with its out-of-band reply.
    ReqId,
    u64
);
