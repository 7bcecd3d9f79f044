//! Batched op conformance, instantiated for every device and the relevant
//! dtypes. Results are compared against the per-tensor ops applied to each
//! list entry individually.

use foreach_conformance::{
    DEVICES, all_dtypes, assert_tensor_lists_close, floating_and_complex_dtypes, full_list,
    gen_data, gen_positive_data, integral_dtypes, ones_list, real_dtypes_without_bf16,
    zeros_list,
};
use foreach_core::{Complex64, DType, Device, Result, Scalar, Shape, Tensor, TensorError};
use foreach_engine::*;
use foreach_ops::PointwiseExt;

fn per_tensor(list: &[Tensor], f: impl Fn(&Tensor) -> Result<Tensor>) -> Vec<Tensor> {
    list.iter().map(|t| f(t).unwrap()).collect()
}

fn for_each_case(dtypes: &[DType], mut f: impl FnMut(Device, DType)) {
    let _ = tracing_subscriber::fmt::try_init();
    for device in DEVICES {
        for &dtype in dtypes {
            f(device, dtype);
        }
    }
}

type BinOp = for<'a> fn(&'a [Tensor], Rhs<'a>) -> Result<()>;

fn bin_ops() -> [(&'static str, BinOp); 8] {
    [
        ("add", |l, r| foreach_add(l, r, None).map(drop)),
        ("add_", |l, r| foreach_add_(l, r, None)),
        ("sub", |l, r| foreach_sub(l, r, None).map(drop)),
        ("sub_", |l, r| foreach_sub_(l, r, None)),
        ("mul", |l, r| foreach_mul(l, r).map(drop)),
        ("mul_", |l, r| foreach_mul_(l, r)),
        ("div", |l, r| foreach_div(l, r).map(drop)),
        ("div_", |l, r| foreach_div_(l, r)),
    ]
}

// ── Unary ops ────────────────────────────────────────────────────────────

#[test]
fn sqrt() {
    for_each_case(&floating_and_complex_dtypes(), |device, dtype| {
        let tensors = ones_list(2, &[2, 2], dtype, device);

        let expected = per_tensor(&tensors, |t| t.sqrt());
        let res = foreach_sqrt(&tensors).unwrap();
        foreach_sqrt_(&tensors).unwrap();

        let fresh = per_tensor(&ones_list(2, &[2, 2], dtype, device), |t| t.sqrt());
        assert_tensor_lists_close(&res, &fresh);
        assert_tensor_lists_close(&tensors, &res);
        assert_tensor_lists_close(&expected, &res);
    });
}

#[test]
fn exp() {
    for_each_case(&floating_and_complex_dtypes(), |device, dtype| {
        let tensors = ones_list(20, &[20, 20], dtype, device);

        let res = foreach_exp(&tensors).unwrap();
        foreach_exp_(&tensors).unwrap();

        let expected = per_tensor(&ones_list(20, &[20, 20], dtype, device), |t| t.exp());
        assert_tensor_lists_close(&res, &expected);
        assert_tensor_lists_close(&tensors, &res);
    });
}

#[test]
fn sqrt_integral_promotes_out_of_place_only() {
    for_each_case(&integral_dtypes(), |device, dtype| {
        let tensors = full_list(2, &[3], 4, dtype, device);
        let res = foreach_sqrt(&tensors).unwrap();
        assert_tensor_lists_close(&res, &full_list(2, &[3], 2.0, DType::F32, device));
        assert!(matches!(
            foreach_sqrt_(&tensors),
            Err(TensorError::UnsafeCast { to, .. }) if to == dtype
        ));
    });
}

#[test]
fn neg() {
    for_each_case(&all_dtypes(), |device, dtype| {
        let tensors = ones_list(3, &[4], dtype, device);
        if dtype == DType::Bool {
            assert!(foreach_neg(&tensors).is_err());
            assert!(foreach_neg_(&tensors).is_err());
            return;
        }
        let res = foreach_neg(&tensors).unwrap();
        assert_tensor_lists_close(&res, &per_tensor(&tensors, |t| t.neg()));
        foreach_neg_(&tensors).unwrap();
        assert_tensor_lists_close(&tensors, &res);
    });
}

// ── Pointwise ops ────────────────────────────────────────────────────────

#[test]
fn addcmul() {
    for_each_case(&real_dtypes_without_bf16(), |device, dtype| {
        let tensors = ones_list(20, &[20, 20], dtype, device);
        let tensors1 = ones_list(20, &[20, 20], dtype, device);
        let tensors2 = ones_list(20, &[20, 20], dtype, device);

        let res = foreach_addcmul(&tensors, &tensors1, &tensors2, 2).unwrap();
        let expected: Vec<Tensor> = (0..20)
            .map(|n| tensors[n].addcmul(&tensors1[n], &tensors2[n], 2).unwrap())
            .collect();
        assert_tensor_lists_close(&res, &expected);

        foreach_addcmul_(&tensors, &tensors1, &tensors2, 2).unwrap();
        assert_tensor_lists_close(&tensors, &res);
    });
}

#[test]
fn addcdiv() {
    for_each_case(&real_dtypes_without_bf16(), |device, dtype| {
        let tensors = ones_list(20, &[20, 20], dtype, device);
        let tensors1 = ones_list(20, &[20, 20], dtype, device);
        let tensors2 = ones_list(20, &[20, 20], dtype, device);

        if dtype.is_integral() {
            assert!(matches!(
                foreach_addcdiv(&tensors, &tensors1, &tensors2, 2),
                Err(TensorError::Unsupported { op: "addcdiv", .. })
            ));
            assert!(foreach_addcdiv_(&tensors, &tensors1, &tensors2, 2).is_err());
            return;
        }

        let res = foreach_addcdiv(&tensors, &tensors1, &tensors2, 2).unwrap();
        let expected: Vec<Tensor> = (0..20)
            .map(|n| tensors[n].addcdiv(&tensors1[n], &tensors2[n], 2).unwrap())
            .collect();
        assert_tensor_lists_close(&res, &expected);

        foreach_addcdiv_(&tensors, &tensors1, &tensors2, 2).unwrap();
        assert_tensor_lists_close(&tensors, &res);
    });
}

#[test]
fn addcmul_bool_unsupported() {
    for device in DEVICES {
        let t = ones_list(2, &[2], DType::Bool, device);
        assert!(matches!(
            foreach_addcmul(&t, &t, &t, true),
            Err(TensorError::Unsupported { op: "addcmul", .. })
        ));
    }
}

// ── Ops with scalar ──────────────────────────────────────────────────────

#[test]
fn int_scalar() {
    for_each_case(&all_dtypes(), |device, dtype| {
        let tensors = zeros_list(10, &[10, 10], dtype, device);

        // bool tensor + 1 promotes to i64
        let expected_dtype = if dtype == DType::Bool { DType::I64 } else { dtype };
        let expected = ones_list(10, &[10, 10], expected_dtype, device);

        let res = foreach_add(&tensors, 1, None).unwrap();
        assert_tensor_lists_close(&res, &expected);

        if dtype == DType::Bool {
            let err = foreach_add_(&tensors, 1, None).unwrap_err();
            assert_eq!(
                err.to_string(),
                "result type i64 can't be cast to the desired output type bool"
            );
        } else {
            foreach_add_(&tensors, 1, None).unwrap();
            assert_tensor_lists_close(&res, &tensors);
        }
    });
}

#[test]
fn float_scalar() {
    for_each_case(&all_dtypes(), |device, dtype| {
        let tensors = zeros_list(10, &[10, 10], dtype, device);
        let integral = dtype.is_integral() || dtype.is_bool();

        let expected_dtype = if integral { DType::F32 } else { dtype };
        let expected = ones_list(10, &[10, 10], expected_dtype, device);

        let res = foreach_add(&tensors, 1.0, None).unwrap();
        assert_tensor_lists_close(&res, &expected);

        if integral {
            assert!(foreach_add_(&tensors, 1.0, None).is_err());
        } else {
            foreach_add_(&tensors, 1.0, None).unwrap();
            assert_tensor_lists_close(&res, &tensors);
        }
    });
}

#[test]
fn complex_scalar() {
    let complex_scalar = Complex64::new(3.0, 5.0);
    for_each_case(&all_dtypes(), |device, dtype| {
        let tensors = zeros_list(10, &[10, 10], dtype, device);

        if device == Device::Gpu && dtype.is_floating() {
            assert!(matches!(
                foreach_add_(&tensors, complex_scalar, None),
                Err(TensorError::Overflow { .. })
            ));
            assert!(matches!(
                foreach_add(&tensors, complex_scalar, None),
                Err(TensorError::Overflow { .. })
            ));
            return;
        }

        let expected = per_tensor(&zeros_list(10, &[10, 10], dtype, device), |t| {
            t.add(complex_scalar)
        });
        let res = foreach_add(&tensors, complex_scalar, None).unwrap();
        assert_tensor_lists_close(&res, &expected);

        if dtype.is_complex() {
            foreach_add_(&tensors, complex_scalar, None).unwrap();
            assert_tensor_lists_close(&res, &tensors);
        } else {
            assert!(foreach_add_(&tensors, complex_scalar, None).is_err());
        }
    });
}

#[test]
fn bool_scalar() {
    for_each_case(&all_dtypes(), |device, dtype| {
        let tensors = zeros_list(10, &[10, 10], dtype, device);
        let expected = ones_list(10, &[10, 10], dtype, device);

        let res = foreach_add(&tensors, true, None).unwrap();
        assert_tensor_lists_close(&res, &expected);

        foreach_add_(&tensors, true, None).unwrap();
        assert_tensor_lists_close(&res, &tensors);
    });
}

#[test]
fn add_with_different_size_tensors() {
    for_each_case(&all_dtypes(), |device, dtype| {
        if dtype == DType::Bool {
            return;
        }
        let tensors: Vec<Tensor> = (0..10)
            .map(|n| Tensor::zeros(&Shape::new(vec![10 + n, 10 + n]), dtype, &device))
            .collect();
        let expected: Vec<Tensor> = (0..10)
            .map(|n| Tensor::ones(&Shape::new(vec![10 + n, 10 + n]), dtype, &device))
            .collect();

        foreach_add_(&tensors, 1, None).unwrap();
        assert_tensor_lists_close(&expected, &tensors);
    });
}

#[test]
fn add_scalar_with_empty_list_and_empty_tensor() {
    for device in DEVICES {
        let tensors = vec![Tensor::from_f32(&[], &Shape::new(vec![0]), &device).unwrap()];
        let res = foreach_add(&tensors, 1, None).unwrap();
        assert_tensor_lists_close(&res, &tensors);

        foreach_add_(&tensors, 1, None).unwrap();
        assert_tensor_lists_close(&res, &tensors);

        let empty: Vec<Tensor> = Vec::new();
        assert!(foreach_add(&empty, 1, None).unwrap().is_empty());
        foreach_add_(&empty, 1, None).unwrap();
    }
}

#[test]
fn add_scalar_with_overlapping_tensors() {
    for_each_case(&all_dtypes(), |device, dtype| {
        let base = Tensor::ones(&Shape::new(vec![1, 1]), dtype, &device);
        let tensors = vec![base.expand(&Shape::new(vec![2, 1, 3])).unwrap()];

        // bool tensor + 1 promotes to i64
        let expected_dtype = if dtype == DType::Bool { DType::I64 } else { dtype };
        let expected = full_list(1, &[2, 1, 3], 2, expected_dtype, device);

        let res = foreach_add(&tensors, 1, None).unwrap();
        assert_tensor_lists_close(&res, &expected);

        if dtype != DType::Bool {
            foreach_add_(&tensors, 1, None).unwrap();
            assert_tensor_lists_close(&tensors, &expected);
            assert_tensor_lists_close(&[base], &full_list(1, &[1, 1], 2, dtype, device));
        }
    });
}

#[test]
fn bin_op_scalar_with_different_tensor_dtypes() {
    for device in DEVICES {
        let tensors = vec![
            Tensor::from_f32(&[1.1], &Shape::new(vec![1]), &device).unwrap(),
            Tensor::from_slice(&[1i64], &Shape::new(vec![1]), &device).unwrap(),
        ];
        for (name, bin_op) in bin_ops() {
            assert!(
                matches!(
                    bin_op(&tensors, Rhs::Scalar(Scalar::Int(1))),
                    Err(TensorError::DtypeMismatch { .. })
                ),
                "{name} accepted mixed dtypes"
            );
        }
    }
}

#[test]
fn scalar_list() {
    for_each_case(&[DType::I32, DType::F32, DType::C128], |device, dtype| {
        let tensors = zeros_list(3, &[4], dtype, device);
        let scalars = vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)];

        let res = foreach_add(&tensors, &scalars, Some(Scalar::Int(2))).unwrap();
        for (k, t) in res.iter().enumerate() {
            let expected = Tensor::full(&Shape::new(vec![4]), 2 * (k as i64 + 1), dtype, &device);
            assert_tensor_lists_close(std::slice::from_ref(t), &[expected]);
        }

        let short = &scalars[..2];
        assert!(matches!(
            foreach_mul(&tensors, short),
            Err(TensorError::LengthMismatch { lhs: 3, rhs: 2 })
        ));
    });
}

// ── Ops with list ────────────────────────────────────────────────────────

#[test]
fn bin_op_list() {
    for_each_case(&all_dtypes(), |device, dtype| {
        if dtype == DType::Bool {
            return;
        }
        let tensors1 = zeros_list(20, &[20, 20], dtype, device);
        let tensors2 = ones_list(20, &[20, 20], dtype, device);

        // add
        let res = foreach_add(&tensors1, &tensors2, None).unwrap();
        foreach_add_(&tensors1, &tensors2, None).unwrap();
        assert_tensor_lists_close(&res, &tensors1);
        assert_tensor_lists_close(&tensors1, &ones_list(20, &[20, 20], dtype, device));

        let res = foreach_add(&tensors1, &tensors2, Some(Scalar::Int(2))).unwrap();
        foreach_add_(&tensors1, &tensors2, Some(Scalar::Int(2))).unwrap();
        assert_tensor_lists_close(&res, &tensors1);
        assert_tensor_lists_close(&tensors1, &full_list(20, &[20, 20], 3, dtype, device));

        // sub
        let res = foreach_sub(&tensors1, &tensors2, Some(Scalar::Int(3))).unwrap();
        foreach_sub_(&tensors1, &tensors2, Some(Scalar::Int(3))).unwrap();
        assert_tensor_lists_close(&res, &tensors1);
        assert_tensor_lists_close(&tensors1, &zeros_list(20, &[20, 20], dtype, device));

        // mul
        let res = foreach_mul(&tensors1, &tensors2).unwrap();
        foreach_mul_(&tensors1, &tensors2).unwrap();
        assert_tensor_lists_close(&res, &tensors1);
        assert_tensor_lists_close(&tensors1, &zeros_list(20, &[20, 20], dtype, device));

        // div
        foreach_add_(&tensors1, 4, None).unwrap();
        foreach_add_(&tensors2, 1, None).unwrap();
        if dtype.is_integral() {
            assert!(matches!(
                foreach_div(&tensors1, &tensors2),
                Err(TensorError::Unsupported { op: "div", .. })
            ));
            assert!(foreach_div_(&tensors1, &tensors2).is_err());
            return;
        }

        let res = foreach_div(&tensors1, &tensors2).unwrap();
        foreach_div_(&tensors1, &tensors2).unwrap();
        assert_tensor_lists_close(&res, &tensors1);
        assert_tensor_lists_close(&tensors1, &full_list(20, &[20, 20], 2, dtype, device));
    });
}

#[test]
fn bin_op_list_error_cases() {
    for device in DEVICES {
        for (name, bin_op) in bin_ops() {
            // empty lists are a no-op
            let empty: Vec<Tensor> = Vec::new();
            assert!(bin_op(&empty, Rhs::Tensors(&empty)).is_ok(), "{name}");

            // one empty list
            let one = vec![Tensor::from_slice(&[1i64], &Shape::new(vec![1]), &device).unwrap()];
            assert!(matches!(
                bin_op(&one, Rhs::Tensors(&empty)),
                Err(TensorError::LengthMismatch { lhs: 1, rhs: 0 })
            ));
            assert!(matches!(
                bin_op(&empty, Rhs::Tensors(&one)),
                Err(TensorError::LengthMismatch { lhs: 0, rhs: 1 })
            ));

            // different number of tensors
            let two = vec![one[0].clone(), one[0].clone()];
            assert!(matches!(
                bin_op(&one, Rhs::Tensors(&two)),
                Err(TensorError::LengthMismatch { .. })
            ));

            // different dtypes
            let tensors1 = zeros_list(2, &[2, 2], DType::F32, device);
            let tensors2 = ones_list(2, &[2, 2], DType::I32, device);
            assert!(matches!(
                bin_op(&tensors1, Rhs::Tensors(&tensors2)),
                Err(TensorError::DtypeMismatch { .. })
            ));
        }
    }
}

#[test]
fn bin_op_list_device_mismatch() {
    let cpu = ones_list(2, &[2], DType::F32, Device::Cpu);
    let gpu = ones_list(2, &[2], DType::F32, Device::Gpu);
    for (name, bin_op) in bin_ops() {
        assert!(
            matches!(
                bin_op(&cpu, Rhs::Tensors(&gpu)),
                Err(TensorError::DeviceMismatch { .. })
            ),
            "{name}"
        );
    }
}

#[test]
fn bin_op_list_broadcasts_per_index() {
    for device in DEVICES {
        let a = vec![
            Tensor::zeros(&Shape::new(vec![2, 3]), DType::F32, &device),
            Tensor::zeros(&Shape::new(vec![4]), DType::F32, &device),
        ];
        let b = vec![
            Tensor::from_f32(&[1.0, 2.0, 3.0], &Shape::new(vec![3]), &device).unwrap(),
            Tensor::ones(&Shape::new(vec![1]), DType::F32, &device),
        ];
        foreach_add_(&a, &b, None).unwrap();
        assert_eq!(
            a[0].to_vec::<f32>().unwrap(),
            vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]
        );
        assert_eq!(a[1].to_vec::<f32>().unwrap(), vec![1.0; 4]);
    }
}

#[test]
fn pointwise_random_data() {
    let fused = Engine::new(DispatchConfig::new(DispatchMode::Fused).with_chunk_size(16));
    for device in DEVICES {
        let shape = Shape::new(vec![7, 9]);
        let make = |seed: u64, positive: bool| -> Vec<Tensor> {
            (0..4)
                .map(|k| {
                    let data = if positive {
                        gen_positive_data(shape.numel(), seed + k)
                    } else {
                        gen_data(shape.numel(), seed + k)
                    };
                    Tensor::from_f32(&data, &shape, &device).unwrap()
                })
                .collect()
        };
        let base = make(1, false);
        let num = make(11, false);
        let den = make(21, true);

        let res = fused.addcdiv(&base, &num, &den, 0.25).unwrap();
        let expected: Vec<Tensor> = (0..4)
            .map(|n| base[n].addcdiv(&num[n], &den[n], 0.25).unwrap())
            .collect();
        assert_tensor_lists_close(&res, &expected);

        let res = fused.sqrt(&den).unwrap();
        assert_tensor_lists_close(&res, &per_tensor(&den, |t| t.sqrt()));
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────────

#[test]
fn fused_and_per_tensor_agree() {
    let fused = Engine::new(DispatchConfig::new(DispatchMode::Fused).with_chunk_size(7));
    let looped = Engine::new(DispatchConfig::new(DispatchMode::PerTensor));
    for_each_case(&real_dtypes_without_bf16(), |device, dtype| {
        let data: Vec<Tensor> = (0..5)
            .map(|n| {
                let values: Vec<Scalar> = (0..(n * 9 + 3))
                    .map(|i| Scalar::Int((i % 7) as i64 + 1))
                    .collect();
                Tensor::from_scalars(&values, &Shape::new(vec![values.len()]), dtype, &device)
                    .unwrap()
            })
            .collect();
        let a = fused.addcmul(&data, &data, &data, 2).unwrap();
        let b = looped.addcmul(&data, &data, &data, 2).unwrap();
        assert_tensor_lists_close(&a, &b);
    });
    assert!(fused.stats().fused_calls > 0);
    assert_eq!(looped.stats().fused_calls, 0);
}

#[test]
fn add_lists_scenario() {
    let tensors1 = zeros_list(20, &[20, 20], DType::F32, Device::Cpu);
    let tensors2 = ones_list(20, &[20, 20], DType::F32, Device::Cpu);

    let res = foreach_add(&tensors1, &tensors2, None).unwrap();
    assert_tensor_lists_close(&res, &ones_list(20, &[20, 20], DType::F32, Device::Cpu));

    foreach_add_(&tensors1, &tensors2, None).unwrap();
    let res = foreach_add(&tensors1, &tensors2, Some(Scalar::Int(2))).unwrap();
    assert_tensor_lists_close(&res, &full_list(20, &[20, 20], 3, DType::F32, Device::Cpu));
}
