mod dummy;

use dummy::{PROGRAM, test_client, test_server};
use pretty_assertions::assert_eq;
use tilescan_runtime::{
    MemoryUsage,
    client::ComputeClient,
    server::{
        AllocationDescriptor, AllocationError, BufferFlags, ComputeServer, IoError, KernelArg,
        LaunchError, LaunchGeometry, ResourceLimitError, ServerError,
    },
};

#[test_log::test]
fn created_resource_is_the_same_when_read() {
    let client = test_client();
    let resource = [0i32, 1, 2];
    let handle = client
        .create_from_slice(&resource, BufferFlags::READ_WRITE)
        .unwrap();

    let obtained = client.read_one::<i32>(&handle).unwrap();

    assert_eq!(obtained, resource.to_vec());
    client.release(handle).unwrap();
}

#[test_log::test]
fn empty_allocates_zeroed_memory() {
    let client = test_client();
    let handle = client.empty(16, BufferFlags::READ_WRITE).unwrap();

    assert_eq!(client.read_one::<i32>(&handle).unwrap(), vec![0; 4]);
    client.release(handle).unwrap();
}

#[test_log::test]
fn execute_scalar_addition() {
    let client = test_client();
    let data = client
        .create_from_slice(&[0i32, 1, 2, 3, 4, 5, 6, 7], BufferFlags::READ_WRITE)
        .unwrap();
    let kernel = client.compile(PROGRAM, "add_scalar").unwrap();

    client
        .bind_all(kernel, &[data.binding(), KernelArg::Scalar(10)])
        .unwrap();
    client.launch(kernel, LaunchGeometry::groups(2, 4)).unwrap();
    client.sync().unwrap();

    assert_eq!(
        client.read_one::<i32>(&data).unwrap(),
        vec![10, 11, 12, 13, 14, 15, 16, 17]
    );
    assert_eq!(client.kernel_name(kernel).as_deref(), Some("add_scalar"));

    client.release(data).unwrap();
    client.release_kernel(kernel).unwrap();
}

#[test_log::test]
fn bindings_persist_across_launches() {
    let client = test_client();
    let data = client.empty(8, BufferFlags::READ_WRITE).unwrap();
    let kernel = client.compile(PROGRAM, "add_scalar").unwrap();

    client
        .bind_all(kernel, &[data.binding(), KernelArg::Scalar(3)])
        .unwrap();
    client.launch(kernel, LaunchGeometry::groups(1, 2)).unwrap();
    client.launch(kernel, LaunchGeometry::groups(1, 2)).unwrap();

    assert_eq!(client.read_one::<i32>(&data).unwrap(), vec![6, 6]);
    client.release(data).unwrap();
}

#[test_log::test]
fn shared_memory_is_private_to_each_group() {
    let client = test_client();
    let input = client
        .create_from_slice(&(0..12).collect::<Vec<i32>>(), BufferFlags::READ)
        .unwrap();
    let output = client.empty(48, BufferFlags::READ_WRITE).unwrap();
    let kernel = client.compile(PROGRAM, "reverse_groups").unwrap();

    client
        .bind_all(
            kernel,
            &[
                input.binding(),
                output.binding(),
                KernelArg::Scratch { len: 4 },
            ],
        )
        .unwrap();
    client.launch(kernel, LaunchGeometry::groups(3, 4)).unwrap();

    assert_eq!(
        client.read_one::<i32>(&output).unwrap(),
        vec![3, 2, 1, 0, 7, 6, 5, 4, 11, 10, 9, 8]
    );

    client.release(input).unwrap();
    client.release(output).unwrap();
}

#[test_log::test]
fn missing_host_kernel_fails_to_compile() {
    let client = test_client();
    let source = "__kernel void unknown(__global int* data) { data[0] = 1; }";

    let err = client.compile(source, "unknown").unwrap_err();

    assert_eq!(err.entry, "unknown");
    assert!(err.log.contains("no host implementation"), "{err}");
}

#[test_log::test]
fn missing_entry_fails_to_compile() {
    let client = test_client();

    let err = client.compile(PROGRAM, "scan").unwrap_err();

    assert!(err.log.contains("add_scalar"), "{err}");
}

#[test_log::test]
fn signature_mismatch_fails_to_compile() {
    let client = test_client();
    let source = "__kernel void add_scalar(__global int* data) {}";

    let err = client.compile(source, "add_scalar").unwrap_err();

    assert!(err.log.contains("host implementation expects"), "{err}");
}

#[test_log::test]
fn invalid_bindings_are_rejected() {
    let client = test_client();
    let kernel = client.compile(PROGRAM, "add_scalar").unwrap();

    assert!(matches!(
        client.bind(kernel, 0, KernelArg::Scalar(1)),
        Err(LaunchError::InvalidArgument { index: 0, .. })
    ));
    assert!(matches!(
        client.bind(kernel, 2, KernelArg::Scalar(1)),
        Err(LaunchError::InvalidArgument { index: 2, .. })
    ));
}

#[test_log::test]
fn launch_requires_every_argument() {
    let client = test_client();
    let data = client.empty(8, BufferFlags::READ_WRITE).unwrap();
    let kernel = client.compile(PROGRAM, "add_scalar").unwrap();
    client.bind(kernel, 0, data.binding()).unwrap();

    let err = client
        .launch(kernel, LaunchGeometry::groups(1, 2))
        .unwrap_err();

    assert!(matches!(err, LaunchError::InvalidArgument { index: 1, .. }));
    client.release(data).unwrap();
}

#[test_log::test]
fn released_buffers_can_not_be_launched() {
    let client = test_client();
    let data = client.empty(8, BufferFlags::READ_WRITE).unwrap();
    let kernel = client.compile(PROGRAM, "add_scalar").unwrap();
    client
        .bind_all(kernel, &[data.binding(), KernelArg::Scalar(1)])
        .unwrap();
    client.release(data).unwrap();

    let err = client
        .launch(kernel, LaunchGeometry::groups(1, 2))
        .unwrap_err();

    assert!(matches!(err, LaunchError::InvalidArgument { index: 0, .. }));
}

#[test_log::test]
fn launch_geometry_is_validated() {
    let client = test_client();
    let data = client.empty(512, BufferFlags::READ_WRITE).unwrap();
    let kernel = client.compile(PROGRAM, "add_scalar").unwrap();
    client
        .bind_all(kernel, &[data.binding(), KernelArg::Scalar(1)])
        .unwrap();

    assert!(matches!(
        client.launch(kernel, LaunchGeometry::new(6, 4)),
        Err(LaunchError::InvalidGeometry { .. })
    ));
    assert!(matches!(
        client.launch(kernel, LaunchGeometry::groups(1, 128)),
        Err(LaunchError::TooManyResources(
            ResourceLimitError::GroupSize { .. }
        ))
    ));

    client.release(data).unwrap();
}

#[test_log::test]
fn shared_memory_is_bounded() {
    let client = test_client();
    let input = client.empty(16, BufferFlags::READ).unwrap();
    let output = client.empty(16, BufferFlags::READ_WRITE).unwrap();
    let kernel = client.compile(PROGRAM, "reverse_groups").unwrap();
    client
        .bind_all(
            kernel,
            &[
                input.binding(),
                output.binding(),
                KernelArg::Scratch { len: 1024 },
            ],
        )
        .unwrap();

    assert!(matches!(
        client.launch(kernel, LaunchGeometry::groups(1, 4)),
        Err(LaunchError::TooManyResources(
            ResourceLimitError::SharedMemory { .. }
        ))
    ));

    client.release(input).unwrap();
    client.release(output).unwrap();
}

#[test_log::test]
fn kernel_failures_are_reported() {
    let client = test_client();
    let data = client.empty(16, BufferFlags::READ_WRITE).unwrap();
    let kernel = client.compile(PROGRAM, "out_of_bounds").unwrap();
    client.bind(kernel, 0, data.binding()).unwrap();

    let err = client
        .launch(kernel, LaunchGeometry::groups(2, 2))
        .unwrap_err();

    match err {
        LaunchError::Execution { entry, reason, .. } => {
            assert_eq!(entry, "out_of_bounds");
            assert!(reason.contains("out of bounds write at 4"), "{reason}");
        }
        err => panic!("Unexpected error {err}"),
    }

    client.release(data).unwrap();
}

#[test_log::test]
fn allocations_are_validated() {
    let client = ComputeClient::new(test_server(1).with_memory_limit(64));

    assert!(matches!(
        client.empty(0, BufferFlags::READ_WRITE),
        Err(AllocationError::ZeroSized { .. })
    ));
    assert!(matches!(
        client.create(AllocationDescriptor::new(8, BufferFlags::READ, Some(&[1u8, 2][..]))),
        Err(AllocationError::InitSizeMismatch {
            size: 8,
            provided: 2,
            ..
        })
    ));

    let first = client.empty(48, BufferFlags::READ_WRITE).unwrap();
    assert!(matches!(
        client.empty(32, BufferFlags::READ_WRITE),
        Err(AllocationError::OutOfMemory {
            requested: 32,
            available: 16,
            ..
        })
    ));
    client.release(first).unwrap();
    assert_eq!(client.memory_usage().allocations, 1);
}

#[test_log::test]
fn transfers_respect_the_buffer_flags() {
    let client = test_client();
    let read_only = client.empty(8, BufferFlags::READ).unwrap();
    let write_only = client.empty(8, BufferFlags::WRITE).unwrap();

    assert!(matches!(
        client.write(&read_only, &[1i32, 2]),
        Err(IoError::AccessDenied { .. })
    ));
    assert!(matches!(
        client.read(&write_only),
        Err(IoError::AccessDenied { .. })
    ));
    assert!(matches!(
        client.write(&write_only, &[1i32]),
        Err(IoError::SizeMismatch {
            expected: 8,
            actual: 4,
            ..
        })
    ));

    client.release(read_only).unwrap();
    client.release(write_only).unwrap();
}

#[test_log::test]
fn memory_usage_tracks_every_buffer() {
    let mut server = test_server(1);

    let first = server
        .create(AllocationDescriptor::zeroed(12, BufferFlags::READ_WRITE))
        .unwrap();
    let second = server
        .create(AllocationDescriptor::zeroed(4, BufferFlags::READ))
        .unwrap();
    assert_eq!(
        server.memory_usage(),
        MemoryUsage {
            buffers: 2,
            bytes_in_use: 16,
            allocations: 2,
            releases: 0,
        }
    );

    let stale = tilescan_runtime::server::Handle::new(first.id(), first.size(), first.flags());
    server.release(first).unwrap();
    server.release(second).unwrap();

    assert!(matches!(
        server.release(stale),
        Err(ServerError::UnknownBuffer { .. })
    ));
    assert_eq!(
        server.memory_usage(),
        MemoryUsage {
            buffers: 0,
            bytes_in_use: 0,
            allocations: 2,
            releases: 2,
        }
    );
}

#[test_log::test]
fn results_do_not_depend_on_the_worker_count() {
    let expected = (0..64).map(|value| value + 5).collect::<Vec<i32>>();

    for workers in [1, 2, 7] {
        let client = ComputeClient::new(test_server(workers));
        let data = client
            .create_from_slice(&(0..64).collect::<Vec<i32>>(), BufferFlags::READ_WRITE)
            .unwrap();
        let kernel = client.compile(PROGRAM, "add_scalar").unwrap();
        client
            .bind_all(kernel, &[data.binding(), KernelArg::Scalar(5)])
            .unwrap();
        client.launch(kernel, LaunchGeometry::groups(16, 4)).unwrap();

        assert_eq!(client.read_one::<i32>(&data).unwrap(), expected);
        client.release(data).unwrap();
    }
}

#[test_log::test]
fn launches_from_cloned_clients_run_one_at_a_time() {
    let client = test_client();

    std::thread::scope(|scope| {
        for value in 1..=4 {
            let client = client.clone();
            scope.spawn(move || {
                let data = client.empty(64 * 4, BufferFlags::READ_WRITE).unwrap();
                let kernel = client.compile(PROGRAM, "add_scalar").unwrap();
                client
                    .bind_all(kernel, &[data.binding(), KernelArg::Scalar(value)])
                    .unwrap();

                for _ in 0..25 {
                    client.launch(kernel, LaunchGeometry::groups(4, 16)).unwrap();
                }

                let expected = vec![25 * value as i32; 64];
                assert_eq!(client.read_one::<i32>(&data).unwrap(), expected);
                client.release(data).unwrap();
                client.release_kernel(kernel).unwrap();
            });
        }
    });

    let usage = client.memory_usage();
    assert_eq!(usage.buffers, 0);
    assert_eq!(usage.allocations, 4);
}
