use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use wgpu::util::DeviceExt;

use super::{Found, SearchBackend, SearchConfig, SearchError, DEFAULT_BATCH_SIZE};
use crate::kernel;
use crate::pattern::{MatchMode, MAX_PATTERN_LEN};

// Result buffer layout, in u32 words (one byte per word for byte arrays).
const RESULT_FOUND: usize = 0;
const RESULT_WORK_ITEM: usize = 1;
const RESULT_PUBKEY: usize = 2; // 32 words
const RESULT_KEYPAIR: usize = 34; // 64 words
const RESULT_ADDR_LEN: usize = 98;
const RESULT_ADDR: usize = 99; // 44 words
const RESULT_WORDS: usize = 143;

/// Kernel parameters, must match the WGSL GrindParams struct exactly.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GrindParams {
    batch_size: u32,
    pattern_len: u32,
    mode: u32, // 0 prefix, 1 suffix, 2 anywhere
    ignore_case: u32,
}

/// Compile WGSL source to SPIR-V words using naga directly.
/// This avoids the hang in wgpu's create_compute_pipeline when processing
/// large WGSL shaders.
fn compile_wgsl_to_spirv(wgsl_source: &str, label: &str) -> Result<Vec<u32>, SearchError> {
    let module = naga::front::wgsl::parse_str(wgsl_source)
        .map_err(|e| SearchError::Dispatch(format!("WGSL parse error in {label}: {e}")))?;

    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| SearchError::Dispatch(format!("WGSL validation error in {label}: {e}")))?;

    let mut spv = Vec::new();
    let options = naga::back::spv::Options {
        lang_version: (1, 3),
        ..Default::default()
    };
    let pipeline_options = naga::back::spv::PipelineOptions {
        shader_stage: naga::ShaderStage::Compute,
        entry_point: "main".to_string(),
    };
    let mut writer = naga::back::spv::Writer::new(&options)
        .map_err(|e| SearchError::Dispatch(format!("SPIR-V writer init error: {e}")))?;
    writer
        .write(&module, &info, Some(&pipeline_options), &None, &mut spv)
        .map_err(|e| SearchError::Dispatch(format!("SPIR-V codegen error in {label}: {e}")))?;

    Ok(spv)
}

/// Compose the unified kernel shader by concatenating the module files.
fn compose_kernel_shader(workgroup_size: u32) -> String {
    let wide = include_str!("../../shaders/wide.wgsl");
    let field = include_str!("../../shaders/field.wgsl");
    let curve = include_str!("../../shaders/curve.wgsl");
    let sha512 = include_str!("../../shaders/sha512.wgsl");
    let encoding = include_str!("../../shaders/encoding.wgsl");
    let pattern = include_str!("../../shaders/pattern.wgsl");
    let grind = include_str!("../../shaders/grind_pass.wgsl");
    format!(
        "const WORKGROUP_SIZE: u32 = {workgroup_size}u;\n\
         {wide}\n{field}\n{curve}\n{sha512}\n{encoding}\n{pattern}\n{grind}"
    )
}

/// Probe for any compute-capable adapter.
pub fn gpu_available() -> bool {
    let instance = wgpu::Instance::default();
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        ..Default::default()
    }))
    .is_ok()
}

pub struct WgpuBackend {
    pub workgroup_size: u32,
}

impl SearchBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn run(
        &self,
        config: &SearchConfig,
        stop: &AtomicBool,
        total: &AtomicU64,
        tx: mpsc::Sender<Found>,
    ) -> Result<(), SearchError> {
        let start = Instant::now();

        // 1. Init wgpu
        eprintln!("[wgpu] initializing...");
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            ..Default::default()
        }))
        .map_err(|_| SearchError::NoGpu)?;
        eprintln!("[wgpu] adapter: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("keygrind"),
            required_features: wgpu::Features::EXPERIMENTAL_PASSTHROUGH_SHADERS,
            experimental_features: unsafe { wgpu::ExperimentalFeatures::enabled() },
            ..Default::default()
        }))
        .map_err(|e| SearchError::Dispatch(format!("request_device: {e}")))?;

        // 2. Geometry: round the batch up to whole work-groups
        let workgroup_size = self.workgroup_size.max(1);
        let num_workgroups = DEFAULT_BATCH_SIZE.div_ceil(workgroup_size);
        let batch_size = num_workgroups * workgroup_size;

        // 3. Compile the unified shader
        eprintln!("[wgpu] compiling shader...");
        let shader_src = compose_kernel_shader(workgroup_size);
        let spv = compile_wgsl_to_spirv(&shader_src, "grind_pass")?;
        eprintln!("[wgpu] SPIR-V compiled ({} words)", spv.len());

        let t = Instant::now();
        let module = unsafe {
            device.create_shader_module_passthrough(wgpu::ShaderModuleDescriptorPassthrough {
                label: Some("grind_pass"),
                spirv: Some(std::borrow::Cow::Borrowed(&spv)),
                ..Default::default()
            })
        };
        eprintln!("[wgpu] module created in {:?}", t.elapsed());

        // 4. Bind group layout: uniform params + pattern/state/result storage
        use wgpu::{BindGroupLayoutEntry, BindingType, BufferBindingType, ShaderStages};

        let storage = |binding: u32, read_only: bool| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grind_bind_group_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, true),
                storage(3, false),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grind_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        eprintln!("[wgpu] creating pipeline...");
        let t = Instant::now();
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("grind_pass_pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions {
                zero_initialize_workgroup_memory: false,
                ..Default::default()
            },
            cache: None,
        });
        eprintln!("[wgpu] pipeline created in {:?}", t.elapsed());

        // 5. Buffers
        let params = GrindParams {
            batch_size,
            pattern_len: config.pattern.len() as u32,
            mode: match config.pattern.mode {
                MatchMode::Prefix => 0,
                MatchMode::Suffix => 1,
                MatchMode::Anywhere => 2,
            },
            ignore_case: config.pattern.ignore_case as u32,
        };
        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grind_params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut pattern_words = [0u32; MAX_PATTERN_LEN];
        for (word, &b) in pattern_words.iter_mut().zip(config.pattern.as_bytes()) {
            *word = b as u32;
        }
        let pattern_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pattern"),
            contents: bytemuck::cast_slice(&pattern_words),
            usage: wgpu::BufferUsages::STORAGE,
        });

        // host seed, written before every dispatch
        let state_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("state"),
            size: 16,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let result_bytes = (RESULT_WORDS * 4) as u64;
        let result_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("result"),
            size: result_bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let result_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("result_staging"),
            size: result_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grind_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pattern_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: state_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: result_buf.as_entire_binding(),
                },
            ],
        });

        eprintln!(
            "[wgpu] setup complete: {num_workgroups} work-groups x {workgroup_size} = {batch_size} attempts/dispatch"
        );

        // 6. Dispatch loop
        let mut is_first = true;

        while !stop.load(Ordering::Relaxed) {
            // reset the single result slot, then reseed every stream
            queue.write_buffer(&result_buf, 0, &[0u8; RESULT_WORDS * 4]);
            let host_seed = super::fresh_host_seed();
            let seed_words = [
                host_seed[0] as u32,
                (host_seed[0] >> 32) as u32,
                host_seed[1] as u32,
                (host_seed[1] >> 32) as u32,
            ];
            queue.write_buffer(&state_buf, 0, bytemuck::cast_slice(&seed_words));

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("grind_encoder"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("grind_pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(num_workgroups, 1, 1);
            }
            encoder.copy_buffer_to_buffer(&result_buf, 0, &result_staging, 0, result_bytes);

            let submit_t = Instant::now();
            queue.submit(Some(encoder.finish()));

            // await completion: the only synchronisation point
            let staging_slice = result_staging.slice(..);
            staging_slice.map_async(wgpu::MapMode::Read, |_| {});
            let _ = device.poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            });
            if is_first {
                eprintln!("[wgpu] first dispatch completed in {:?}", submit_t.elapsed());
                is_first = false;
            }

            let words: Vec<u32> = {
                let data = staging_slice.get_mapped_range();
                bytemuck::cast_slice(&data).to_vec()
            };
            result_staging.unmap();

            total.fetch_add(batch_size as u64, Ordering::Relaxed);

            if words[RESULT_FOUND] != 0 {
                let found = harvest(&words, total.load(Ordering::Relaxed), start)?;
                if tx.send(found).is_err() {
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Parse the winner out of the result slot and re-check it on the host with
/// the portable kernel before reporting.
fn harvest(words: &[u32], attempts: u64, start: Instant) -> Result<Found, SearchError> {
    let mut public_key = [0u8; 32];
    for (i, b) in public_key.iter_mut().enumerate() {
        *b = words[RESULT_PUBKEY + i] as u8;
    }
    let mut keypair = [0u8; 64];
    for (i, b) in keypair.iter_mut().enumerate() {
        *b = words[RESULT_KEYPAIR + i] as u8;
    }
    let addr_len = (words[RESULT_ADDR_LEN] as usize).min(44);
    let address: String = words[RESULT_ADDR..RESULT_ADDR + addr_len]
        .iter()
        .map(|&w| w as u8 as char)
        .collect();

    // the GPU kernel has a history of subtle bugs; re-derive from the seed
    let seed: [u8; 32] = keypair[..32].try_into().expect("seed half");
    if kernel::derive_public_key(&seed) != public_key || keypair[32..] != public_key {
        return Err(SearchError::Verification(address));
    }

    Ok(Found {
        work_item: words[RESULT_WORK_ITEM],
        public_key,
        keypair,
        address,
        attempts,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    /// The composed shader must pass naga's parser and validator; this runs
    /// without any GPU.
    #[test]
    fn kernel_shader_compiles_to_spirv() {
        for wg in [1u32, 64, 256] {
            let spv = compile_wgsl_to_spirv(&compose_kernel_shader(wg), "grind_pass").unwrap();
            assert!(!spv.is_empty());
        }
    }

    #[test]
    fn params_struct_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<GrindParams>(), 16);
    }

    #[test]
    fn result_layout_is_consistent() {
        assert_eq!(RESULT_PUBKEY + 32, RESULT_KEYPAIR);
        assert_eq!(RESULT_KEYPAIR + 64, RESULT_ADDR_LEN);
        assert_eq!(RESULT_ADDR_LEN + 1, RESULT_ADDR);
        assert_eq!(RESULT_ADDR + 44, RESULT_WORDS);
    }

    #[test]
    fn harvest_rejects_inconsistent_payloads() {
        let mut words = vec![0u32; RESULT_WORDS];
        words[RESULT_FOUND] = 1;
        // all-zero seed does not derive an all-zero public key
        let err = harvest(&words, 1, Instant::now());
        assert!(matches!(err, Err(SearchError::Verification(_))));
    }

    #[test]
    fn harvest_accepts_kernel_output() {
        let c = kernel::candidate([0x1122, 0x3344], 17);
        let mut words = vec![0u32; RESULT_WORDS];
        words[RESULT_FOUND] = 1;
        words[RESULT_WORK_ITEM] = 17;
        for (i, &b) in c.public_key.iter().enumerate() {
            words[RESULT_PUBKEY + i] = b as u32;
        }
        let kp = kernel::keypair_bytes(&c.seed, &c.public_key);
        for (i, &b) in kp.iter().enumerate() {
            words[RESULT_KEYPAIR + i] = b as u32;
        }
        words[RESULT_ADDR_LEN] = c.address().len() as u32;
        for (i, &b) in c.address().iter().enumerate() {
            words[RESULT_ADDR + i] = b as u32;
        }
        let found = harvest(&words, 99, Instant::now()).unwrap();
        assert_eq!(found.work_item, 17);
        assert_eq!(found.address.as_bytes(), c.address());
    }

    /// Full GPU round trip: run one dispatch with an always-matching pattern
    /// and check the winner against the portable kernel, bit for bit.
    /// Skips when no adapter is present.
    #[test]
    fn gpu_winner_matches_portable_kernel() {
        if !gpu_available() {
            eprintln!("No GPU available, skipping");
            return;
        }
        let stop = std::sync::Arc::new(AtomicBool::new(false));
        let total = std::sync::Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::channel();
        let handle = {
            let stop = stop.clone();
            let total = total.clone();
            std::thread::spawn(move || {
                let backend = WgpuBackend { workgroup_size: 64 };
                let config = SearchConfig {
                    pattern: Pattern::new("?", MatchMode::Prefix, true).unwrap(),
                };
                backend.run(&config, &stop, &total, tx)
            })
        };
        let found = rx.recv().expect("one winner");
        stop.store(true, Ordering::Relaxed);
        while rx.recv().is_ok() {}
        handle.join().unwrap().unwrap();

        // GPU backends must be bitwise-identical to the portable kernel
        // for the same (host seed, work item); re-deriving from the seed
        // already proved seed -> pk. Check the address byte-for-byte too.
        assert_eq!(found.address, bs58::encode(&found.public_key).into_string());
    }
}
