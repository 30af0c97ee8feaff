mod kernel;

pub use kernel::*;

use tilescan_runtime::{
    DeviceProperties, client::ComputeClient, config::host::HostConfig, host::HostServer,
};

pub type DummyClient = ComputeClient<HostServer>;

pub const PROGRAM: &str = r#"
__kernel void add_scalar(__global int* data, const int value) {
    data[get_global_id(0)] += value;
}

__kernel void reverse_groups(__global const int* input, __global int* output, __local int* tile) {
    const uint lid = get_local_id(0);
    const uint size = get_local_size(0);
    tile[lid] = input[get_global_id(0)];
    barrier(CLK_LOCAL_MEM_FENCE);
    output[get_global_id(0)] = tile[size - 1 - lid];
}

__kernel void out_of_bounds(__global int* data) {
    data[get_global_id(0) + 1] = 0;
}
"#;

pub fn test_server(workers: usize) -> HostServer {
    let properties = DeviceProperties::new("dummy".into(), 64, 1024, 1024 * 1024);

    HostServer::new(properties, &HostConfig { workers })
        .with_kernel(AddScalar::default())
        .with_kernel(ReverseGroups::default())
        .with_kernel(OutOfBounds::default())
}

pub fn test_client() -> DummyClient {
    ComputeClient::new(test_server(2))
}
