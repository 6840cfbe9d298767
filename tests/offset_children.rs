use layouts_and_bindings::bindings::input::{BufferInputs, Input};
use layouts_and_bindings::bindings::visible_to::BufferBindingKind;
use layouts_and_bindings::bindings::{
    BindGroup, BindGroupParams, BindingRef, BufferBinding, BufferBindingParams,
};
use layouts_and_bindings::device::DeviceManager;
use layouts_and_bindings::imp::{BindingResource, RecordingDevice};
use layouts_and_bindings::layout::{InputType, WgslType};
use std::cell::RefCell;
use std::rc::Rc;

fn parent(floats: usize) -> Rc<RefCell<BufferBinding>> {
    Rc::new(RefCell::new(BufferBinding::new(BufferBindingParams {
        label: "instances".to_string(),
        binding_type: BufferBindingKind::Storage,
        inputs: BufferInputs::new().with(
            "data",
            Input::new(InputType::Array(WgslType::F32), vec![0.0; floats]),
        ),
        ..Default::default()
    })))
}

fn instance(index: usize, scale: f64) -> BufferBindingParams {
    BufferBindingParams {
        label: format!("instance {index}"),
        binding_type: BufferBindingKind::Storage,
        inputs: BufferInputs::new()
            .with("offset", Input::new(WgslType::Vec3f, [index as f64, 0.0, 0.0]))
            .with("scale", Input::new(WgslType::F32, scale)),
        offset_index: index,
        ..Default::default()
    }
}

fn entry_offsets(group: &BindGroup) -> Vec<u64> {
    group
        .group_entries()
        .iter()
        .filter_map(|entry| match entry.resource {
            BindingResource::Buffer { offset, .. } => Some(offset),
            _ => None,
        })
        .collect()
}

#[test]
fn fixed_offsets_are_baked_into_the_group() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let parent = parent(256);
    let children: Vec<BindingRef> = (0..4)
        .map(|i| {
            BufferBinding::new(BufferBindingParams {
                parent: Some(parent.clone()),
                ..instance(i, 1.0 + i as f64)
            })
            .into()
        })
        .collect();
    let mut group = BindGroup::new(
        &mut manager,
        BindGroupParams {
            label: "instances".to_string(),
            bindings: children,
            ..Default::default()
        },
    );
    group.create_bind_group(&mut manager).unwrap();
    assert_eq!(entry_offsets(&group), vec![0, 256, 512, 768]);
    assert!(group.dynamic_offsets().is_empty());

    group.update(&mut manager).unwrap();
    let handle = parent.borrow().buffer().handle().unwrap();
    assert_eq!(manager.device().write_count(handle), 1);
    let contents = manager.device().buffer_contents(handle).unwrap();
    assert_eq!(&contents[768..772], &3.0f32.to_le_bytes());
    assert_eq!(&contents[780..784], &4.0f32.to_le_bytes());
}

#[test]
fn smaller_minimum_offset_packs_tighter() {
    let parent = parent(64);
    let child = BufferBinding::new(BufferBindingParams {
        parent: Some(parent.clone()),
        min_offset: 64,
        ..instance(3, 1.0)
    });
    assert_eq!(child.array_buffer_size(), 16);
    assert_eq!(child.offset(), 192);
}

#[test]
fn moving_into_a_parent_rebuilds_the_group() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let parent = parent(256);
    let child = Rc::new(RefCell::new(BufferBinding::new(instance(1, 2.0))));
    let mut group = BindGroup::new(
        &mut manager,
        BindGroupParams {
            label: "single".to_string(),
            bindings: vec![child.clone().into()],
            ..Default::default()
        },
    );
    group.create_bind_group(&mut manager).unwrap();
    let own = child.borrow().buffer().handle().unwrap();
    let first_group = group.bind_group();

    child
        .borrow_mut()
        .set_parent(Some(&parent), manager.device_mut());
    assert!(manager.device().is_destroyed(own));
    group.update(&mut manager).unwrap();
    assert_ne!(group.bind_group(), first_group);
    assert_eq!(entry_offsets(&group), vec![256]);

    group.update(&mut manager).unwrap();
    let shared = parent.borrow().buffer().handle().unwrap();
    let contents = manager.device().buffer_contents(shared).unwrap();
    assert_eq!(&contents[268..272], &2.0f32.to_le_bytes());

    child.borrow_mut().set_offset_index(2);
    group.update(&mut manager).unwrap();
    assert_eq!(entry_offsets(&group), vec![512]);
}

#[test]
fn parent_buffer_lives_while_any_group_uses_it() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let parent = parent(256);
    let mut groups: Vec<BindGroup> = (0..2)
        .map(|i| {
            let child = BufferBinding::new(BufferBindingParams {
                parent: Some(parent.clone()),
                ..instance(i, 1.0)
            });
            BindGroup::new(
                &mut manager,
                BindGroupParams {
                    label: format!("group {i}"),
                    bindings: vec![child.into()],
                    ..Default::default()
                },
            )
        })
        .collect();
    for group in &mut groups {
        group.create_bind_group(&mut manager).unwrap();
    }
    let handle = parent.borrow().buffer().handle().unwrap();
    assert_eq!(manager.device().live_buffer_count(), 1);

    groups[0].destroy(&mut manager);
    assert!(!manager.device().is_destroyed(handle));
    groups[1].destroy(&mut manager);
    assert!(manager.device().is_destroyed(handle));
}

#[test]
fn parent_fields_do_not_cover_children_listed_before_it() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let parent = parent(192);
    let child = BufferBinding::new(BufferBindingParams {
        label: "instance 1".to_string(),
        binding_type: BufferBindingKind::Storage,
        inputs: BufferInputs::new().with("scale", Input::new(WgslType::F32, 4.0)),
        parent: Some(parent.clone()),
        offset_index: 1,
        ..Default::default()
    });
    let mut group = BindGroup::new(
        &mut manager,
        BindGroupParams {
            label: "instances".to_string(),
            bindings: vec![child.into(), parent.clone().into()],
            ..Default::default()
        },
    );
    group.create_bind_group(&mut manager).unwrap();
    group.update(&mut manager).unwrap();
    let handle = parent.borrow().buffer().handle().unwrap();
    let contents = manager.device().buffer_contents(handle).unwrap();
    assert_eq!(&contents[256..260], &4.0f32.to_le_bytes());
}

#[test]
fn children_in_another_group_survive_a_parent_rewrite() {
    let mut manager = DeviceManager::new(RecordingDevice::new());
    let parent = parent(192);
    let child = BufferBinding::new(BufferBindingParams {
        parent: Some(parent.clone()),
        ..instance(1, 4.0)
    });
    let mut children = BindGroup::new(
        &mut manager,
        BindGroupParams {
            label: "children".to_string(),
            bindings: vec![child.into()],
            ..Default::default()
        },
    );
    let mut owner = BindGroup::new(
        &mut manager,
        BindGroupParams {
            label: "owner".to_string(),
            bindings: vec![parent.clone().into()],
            ..Default::default()
        },
    );
    children.create_bind_group(&mut manager).unwrap();
    owner.create_bind_group(&mut manager).unwrap();
    children.update(&mut manager).unwrap();
    owner.update(&mut manager).unwrap();

    parent.borrow_mut().set_value("data", vec![0.0f32; 192]);
    owner.update(&mut manager).unwrap();
    children.update(&mut manager).unwrap();
    let handle = parent.borrow().buffer().handle().unwrap();
    let contents = manager.device().buffer_contents(handle).unwrap();
    assert_eq!(&contents[268..272], &4.0f32.to_le_bytes());
}
