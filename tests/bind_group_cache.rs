use layouts_and_bindings::bindings::bind_group::InputBindingParams;
use layouts_and_bindings::bindings::input::{BufferInputs, Input, InputValue};
use layouts_and_bindings::bindings::sampler::{SamplerBinding, SamplerBindingParams};
use layouts_and_bindings::bindings::texture::{TextureBinding, TextureBindingParams};
use layouts_and_bindings::bindings::visible_to::ShaderStages;
use layouts_and_bindings::bindings::{BindGroup, BindGroupParams, BindingRef};
use layouts_and_bindings::device::DeviceManager;
use layouts_and_bindings::imp::{RecordingDevice, SamplerHandle, TextureHandle};
use layouts_and_bindings::layout::WgslType;
use std::cell::RefCell;
use std::rc::Rc;

fn material(label: &str, roughness: f64, visibility: Option<ShaderStages>) -> BindGroupParams {
    let mut declaration = InputBindingParams::new(
        BufferInputs::new()
            .with("base color", Input::new(WgslType::Vec4f, [1.0, 1.0, 1.0, 1.0]))
            .with("roughness", Input::new(WgslType::F32, roughness)),
    );
    declaration.visibility = visibility;
    BindGroupParams {
        label: label.to_string(),
        index: 1,
        uniforms: vec![("material".to_string(), declaration)],
        ..Default::default()
    }
}

#[test]
fn many_materials_build_one_layout() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let mut groups = Vec::new();
    for i in 0..100 {
        let mut group = BindGroup::new(&mut manager, material(&format!("material {i}"), i as f64 / 100.0, None));
        group.create_bind_group(&mut manager).unwrap();
        groups.push(group);
    }
    assert_eq!(manager.device().layout_count(), 1);
    assert_eq!(manager.device().group_count(), 100);
    assert_eq!(manager.device().live_buffer_count(), 100);
    assert_eq!(manager.cache().layout_stats().hits, 99);
    assert_eq!(manager.cache().binding_stats().hits, 99);
    assert!(
        groups
            .windows(2)
            .all(|pair| pair[0].pipeline_cache_key() == pair[1].pipeline_cache_key())
    );
    assert_eq!(groups[42].index(), 1);
}

#[test]
fn visibility_separates_layouts() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let mut everywhere = BindGroup::new(&mut manager, material("a", 0.5, None));
    let mut fragment_only = BindGroup::new(
        &mut manager,
        material("b", 0.5, Some(ShaderStages::FRAGMENT)),
    );
    everywhere.create_bind_group(&mut manager).unwrap();
    fragment_only.create_bind_group(&mut manager).unwrap();
    assert_ne!(everywhere.layout_cache_key(), fragment_only.layout_cache_key());
    assert_ne!(everywhere.bind_group_layout(), fragment_only.bind_group_layout());
    assert_eq!(manager.device().layout_count(), 2);
}

#[test]
fn textures_and_samplers_share_layouts_across_resources() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let mut build = |texture: u64| {
        let bindings: Vec<BindingRef> = vec![
            TextureBinding::new(TextureBindingParams {
                label: "albedo".to_string(),
                texture: Some(TextureHandle(texture)),
                ..Default::default()
            })
            .into(),
            SamplerBinding::new(SamplerBindingParams {
                label: "albedo sampler".to_string(),
                sampler: Some(SamplerHandle(1)),
                ..Default::default()
            })
            .into(),
        ];
        let mut group = BindGroup::new(
            &mut manager,
            BindGroupParams {
                label: format!("textured {texture}"),
                bindings,
                ..Default::default()
            },
        );
        group.create_bind_group(&mut manager).unwrap();
        group
    };
    let a = build(10);
    let b = build(11);
    assert_eq!(a.bind_group_layout(), b.bind_group_layout());
    assert_ne!(a.bind_group(), b.bind_group());
    assert_eq!(a.layout_entries().len(), 2);
    assert_eq!(a.group_entries()[1].binding, 1);
}

#[test]
fn index_and_names_are_exposed() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let sampler = Rc::new(RefCell::new(SamplerBinding::new(SamplerBindingParams {
        label: "shadow sampler".to_string(),
        sampler: Some(SamplerHandle(3)),
        ..Default::default()
    })));
    let mut group = BindGroup::new(
        &mut manager,
        BindGroupParams {
            label: "shadows".to_string(),
            bindings: vec![sampler.clone().into()],
            ..Default::default()
        },
    );
    assert!(group.should_create_bind_group());
    group.set_index(2);
    assert_eq!(group.index(), 2);
    let found = group.get_binding_by_name("shadowSampler").unwrap();
    assert!(found.ptr_eq(&BindingRef::from(sampler)));
    assert!(group.get_binding_by_name("missing").is_none());
}

#[test]
fn empty_group_creates_nothing() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let group = BindGroup::new(
        &mut manager,
        BindGroupParams {
            label: "empty".to_string(),
            ..Default::default()
        },
    );
    assert!(!group.should_create_bind_group());
    assert!(group.dynamic_offsets().is_empty());
    assert!(manager.device().calls().is_empty());
}

#[test]
fn different_struct_shapes_never_share_a_layout() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let mut build = |label: &str, ty: WgslType, value: InputValue| {
        let mut group = BindGroup::new(
            &mut manager,
            BindGroupParams {
                label: label.to_string(),
                uniforms: vec![(
                    "transform".to_string(),
                    InputBindingParams::new(BufferInputs::new().with("x", Input::new(ty, value))),
                )],
                ..Default::default()
            },
        );
        group.create_bind_group(&mut manager).unwrap();
        group
    };
    let scalar = build("scalar", WgslType::F32, 1.0f64.into());
    let matrix = build("matrix", WgslType::Mat4x4f, [0.0f64; 16].into());
    assert_ne!(scalar.layout_cache_key(), matrix.layout_cache_key());
    assert_ne!(scalar.bind_group_layout(), matrix.bind_group_layout());
    assert_eq!(manager.device().layout_count(), 2);
}
