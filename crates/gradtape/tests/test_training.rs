//! Integration tests for the training step, execution contexts and
//! optimizers working together.

use approx::assert_relative_eq;
use gradtape::{
    Error, GradientError, GraphExecutionContext, Metric, ModuleParameter, Optimizer, ParamId,
    Phase, Result, Scope, Sgd, StepState, TapeMode, Tensor, TensorError, TrainingConfig, Var,
    accuracy, adam, create_inference_context, create_training_context, sgd,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn trainable(data: Vec<f64>, shape: &[usize]) -> Tensor<f64> {
    Tensor::from_vec(data, shape).unwrap().with_requires_grad()
}

fn scalar_weight(name: &str, value: f64) -> ModuleParameter<f64> {
    ModuleParameter::weight(name, Tensor::scalar(value).with_requires_grad()).unwrap()
}

#[test]
fn test_linear_regression_converges() {
    let ctx = create_training_context::<f64>();
    let scope = ctx.enter().unwrap();

    let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[4, 1]).unwrap();
    let y = Tensor::from_vec(vec![2.0, 4.0, 6.0, 8.0], &[4, 1]).unwrap();
    let mut w = ModuleParameter::weight("w", trainable(vec![0.5], &[1, 1])).unwrap();
    let mut opt = sgd(0.01);

    let mut losses = Vec::new();
    for _ in 0..100 {
        let report = scope
            .train_step(&mut opt, &mut [&mut w], |s, p| {
                let pred = s.matmul(&s.constant(x.clone()), &p[0])?;
                s.mse_loss(&pred, &s.constant(y.clone()))
            })
            .unwrap();
        losses.push(report.loss);
    }

    let w_final = w.value().item().unwrap();
    assert!((w_final - 2.0).abs() < 1.5);
    // dL/dw = 15 (w - 2), so each step shrinks the error by 0.85
    assert_relative_eq!(w_final, 2.0, epsilon = 1e-6);
    assert!(losses.windows(2).all(|pair| pair[1] <= pair[0]));
    assert_eq!(ctx.completed_steps(), 100);
}

#[test]
fn test_failed_step_is_atomic_across_parameters() {
    let ctx = create_training_context::<f64>();
    let scope = ctx.enter().unwrap();
    let mut a = scalar_weight("a", 1.0);
    let mut b = ModuleParameter::bias("b", trainable(vec![1.0, 2.0], &[2])).unwrap();

    let err = scope
        .train_step(&mut sgd(0.5), &mut [&mut a, &mut b], |s, p| {
            let ok = s.square(&p[0])?;
            // shape error after part of the graph was recorded
            let _ = s.mul(&ok, &p[1])?;
            Ok(ok)
        })
        .unwrap_err();

    assert!(matches!(err, Error::Backend(_)));
    assert_eq!(a.value().item(), Some(1.0));
    assert_eq!(b.value().data(), &[1.0, 2.0]);
    assert!(a.gradient().is_none() && b.gradient().is_none());
    assert_eq!(scope.step_state(), StepState::Idle);
    assert_eq!(scope.tape_len(), 0);

    // The context is still usable after the failure.
    let report = scope
        .train_step(&mut sgd(0.5), &mut [&mut a], |s, p| s.square(&p[0]))
        .unwrap();
    assert_eq!(report.step, 1);
    assert_relative_eq!(a.value().item().unwrap(), 0.0);
}

/// Momentum SGD whose second update in a call fails.
#[derive(Debug)]
struct FailsOnSecondUpdate {
    inner: Sgd<f64>,
    calls: usize,
}

impl Optimizer<f64> for FailsOnSecondUpdate {
    fn name(&self) -> &'static str {
        "fails_on_second_update"
    }

    fn learning_rate(&self) -> f64 {
        self.inner.learning_rate()
    }

    fn set_learning_rate(&mut self, learning_rate: f64) {
        self.inner.set_learning_rate(learning_rate);
    }

    fn update(&mut self, id: ParamId, value: &mut Tensor<f64>, grad: &Tensor<f64>) -> Result<()> {
        self.calls += 1;
        if self.calls == 2 {
            return Err(TensorError::InvalidShape { shape: vec![0] }.into());
        }
        self.inner.update(id, value, grad)
    }

    fn commit_state(&mut self) {
        self.inner.commit_state();
    }

    fn discard_state(&mut self) {
        self.calls = 0;
        self.inner.discard_state();
    }
}

#[test]
fn test_failed_optimizer_update_is_atomic() {
    let ctx = create_training_context::<f64>();
    let scope = ctx.enter().unwrap();
    let mut a = scalar_weight("a", 1.0);
    let mut b = scalar_weight("b", 1.0);
    let mut opt = FailsOnSecondUpdate {
        inner: sgd(0.1).with_momentum(0.9),
        calls: 0,
    };

    fn loss(s: &Scope<'_, f64>, p: &[Var<f64>]) -> Result<Var<f64>> {
        let sum = s.add(&p[0], &p[1])?;
        s.square(&sum)
    }
    let err = scope
        .train_step(&mut opt, &mut [&mut a, &mut b], loss)
        .unwrap_err();

    assert!(matches!(err, Error::Backend(TensorError::InvalidShape { .. })));
    assert_eq!(a.value().item(), Some(1.0));
    assert_eq!(b.value().item(), Some(1.0));
    assert!(a.gradient().is_none() && b.gradient().is_none());
    assert!(opt.inner.velocity(a.id()).is_none());
    assert_eq!(scope.step_state(), StepState::Idle);
    assert_eq!(ctx.completed_steps(), 0);

    // d/da (a + b)^2 = 4, so a retry with the working rule moves both by lr * 4.
    let report = scope
        .train_step(&mut opt.inner, &mut [&mut a, &mut b], loss)
        .unwrap();
    assert_eq!(report.step, 1);
    assert_relative_eq!(a.value().item().unwrap(), 0.6);
    assert_relative_eq!(b.value().item().unwrap(), 0.6);
}

#[test]
fn test_eval_context_never_records_and_rejects_steps() {
    let ctx = create_inference_context::<f64>();
    let scope = ctx.enter().unwrap();
    let w = trainable(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]);

    let out = scope.matmul(&scope.input(&w), &scope.input(&w)).unwrap();
    let loss = scope.sum(&out);
    assert!(!loss.is_tracked());
    assert_eq!(scope.tape_len(), 0);

    let mut p = ModuleParameter::weight("w", w).unwrap();
    let err = scope
        .train_step(&mut sgd(0.1), &mut [&mut p], |s, v| Ok(s.sum(&v[0])))
        .unwrap_err();
    assert!(matches!(err, Error::StateConflict(_)));

    let err = scope
        .value_and_grad(&[p.value()], |s, v| Ok(s.sum(&v[0])))
        .unwrap_err();
    assert!(matches!(err, Error::StateConflict(_)));
    assert_eq!(ctx.completed_steps(), 0);
}

#[test]
fn test_second_context_on_same_thread_conflicts() {
    let train = create_training_context::<f64>();
    let eval = create_inference_context::<f64>();

    let scope = train.enter().unwrap();
    assert!(matches!(eval.enter(), Err(Error::StateConflict(_))));
    assert!(matches!(train.enter(), Err(Error::StateConflict(_))));
    drop(scope);

    let scope = eval.enter().unwrap();
    assert_eq!(scope.phase(), Phase::Eval);
}

#[test]
fn test_contexts_on_other_threads_are_independent() {
    let ctx = create_training_context::<f64>();
    let _scope = ctx.enter().unwrap();

    let handle = std::thread::spawn(|| {
        let ctx = create_training_context::<f64>();
        let scope = ctx.enter().unwrap();
        let mut w = scalar_weight("w", 3.0);
        scope
            .train_step(&mut sgd(0.25), &mut [&mut w], |s, p| s.square(&p[0]))
            .unwrap();
        w.value().item().unwrap()
    });
    assert_relative_eq!(handle.join().unwrap(), 1.5);
}

#[test]
fn test_stale_var_from_previous_step_is_rejected() {
    let ctx = create_training_context::<f64>();
    let scope = ctx.enter().unwrap();
    let mut w = scalar_weight("w", 2.0);

    let mut stale: Option<Var<f64>> = None;
    scope
        .train_step(&mut sgd(0.1), &mut [&mut w], |s, p| {
            let loss = s.square(&p[0])?;
            stale = Some(loss.clone());
            Ok(loss)
        })
        .unwrap();

    let stale = stale.unwrap();
    let err = scope
        .train_step(&mut sgd(0.1), &mut [&mut w], |_, _| Ok(stale.clone()))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Gradient(GradientError::RootNotRecorded)
    ));
    assert_relative_eq!(w.value().item().unwrap(), 1.6);
}

#[test]
fn test_momentum_state_persists_between_steps() {
    let ctx = create_training_context::<f64>();
    let scope = ctx.enter().unwrap();
    let mut w = scalar_weight("w", 2.0);
    let mut opt = sgd(0.1).with_momentum(0.9);

    // loss = 3w: v1 = 3, w = 1.7; v2 = 0.9 * 3 + 3 = 5.7, w = 1.13
    for _ in 0..2 {
        scope
            .train_step(&mut opt, &mut [&mut w], |s, p| Ok(s.scale(&p[0], 3.0)))
            .unwrap();
    }
    assert_relative_eq!(w.value().item().unwrap(), 1.13, epsilon = 1e-12);
    assert_relative_eq!(opt.velocity(w.id()).unwrap()[0], 5.7, epsilon = 1e-12);
}

#[test]
fn test_adam_counts_steps_per_parameter() {
    let ctx = create_training_context::<f64>();
    let scope = ctx.enter().unwrap();
    let mut a = scalar_weight("a", 1.0);
    let mut b = scalar_weight("b", -1.0);
    let mut opt = adam(0.1);

    for _ in 0..3 {
        scope
            .train_step(&mut opt, &mut [&mut a, &mut b], |s, p| {
                let sum = s.add(&p[0], &p[1])?;
                s.square(&sum)
            })
            .unwrap();
    }
    scope
        .train_step(&mut opt, &mut [&mut a], |s, p| s.square(&p[0]))
        .unwrap();

    assert_eq!(opt.step_count(a.id()), 4);
    assert_eq!(opt.step_count(b.id()), 3);
}

#[test]
fn test_reuse_tape_mode_from_config() {
    let config = TrainingConfig::from_json_str(
        r#"{"phase": "train", "tape_mode": "reuse",
            "optimizer": {"kind": "sgd", "learning_rate": 0.25}}"#,
    )
    .unwrap();
    let ctx: GraphExecutionContext<f64> =
        GraphExecutionContext::from_config(&config, Default::default()).unwrap();
    assert_eq!(ctx.tape_mode(), TapeMode::Reuse);

    let mut opt: Box<dyn Optimizer<f64>> = config.optimizer.build().unwrap();
    let scope = ctx.enter().unwrap();
    let mut w = scalar_weight("w", 3.0);
    for _ in 0..2 {
        scope
            .train_step(opt.as_mut(), &mut [&mut w], |s, p| s.square(&p[0]))
            .unwrap();
        assert_eq!(scope.tape_len(), 0);
    }
    // w <- w - 0.25 * 2w = w / 2
    assert_relative_eq!(w.value().item().unwrap(), 0.75);
}

fn mlp(scope: &Scope<'_, f64>, x: &Var<f64>, p: &[Var<f64>]) -> Result<Var<f64>> {
    let rows = x.shape()[0];
    let ones = scope.constant(Tensor::ones(&[rows, 1]));
    let hidden = scope.matmul(x, &p[0])?;
    let hidden = scope.add(&hidden, &scope.matmul(&ones, &p[1])?)?;
    let hidden = scope.tanh(&hidden);
    let logits = scope.matmul(&hidden, &p[2])?;
    scope.add(&logits, &scope.matmul(&ones, &p[3])?)
}

#[test]
fn test_xor_mlp_cross_entropy() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut normal = |name: &str, shape: &[usize], std: f64| {
        let value = Tensor::randn_std_with_rng(shape, std, &mut rng).with_requires_grad();
        ModuleParameter::weight(name, value).unwrap()
    };
    let mut w1 = normal("w1", &[2, 8], 1.0);
    let mut w2 = normal("w2", &[8, 2], 0.5);
    let zeros = |name: &str, shape: &[usize]| {
        ModuleParameter::bias(name, Tensor::<f64>::zeros(shape).with_requires_grad()).unwrap()
    };
    let mut b1 = zeros("b1", &[1, 8]);
    let mut b2 = zeros("b2", &[1, 2]);

    let x = Tensor::from_row_major(vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0], &[4, 2])
        .unwrap();
    let labels = Tensor::from_vec(vec![0i64, 1, 1, 0], &[4]).unwrap();

    let ctx = create_training_context::<f64>();
    let scope = ctx.enter().unwrap();

    let evaluate = |params: &[&ModuleParameter<f64>]| -> f64 {
        let vars: Vec<Var<f64>> = params.iter().map(|p| scope.input(p.value())).collect();
        let logits = mlp(&scope, &scope.constant(x.clone()), &vars).unwrap();
        assert!(!logits.is_tracked());
        let mut metric = accuracy();
        metric.update(logits.tensor(), &labels).unwrap();
        Metric::<f64>::compute(&metric)
    };

    let acc_before = evaluate(&[&w1, &b1, &w2, &b2]);
    let mut opt = adam(0.05);
    let mut losses = Vec::new();
    for _ in 0..500 {
        let report = scope
            .train_step(
                &mut opt,
                &mut [&mut w1, &mut b1, &mut w2, &mut b2],
                |s, p| {
                    let logits = mlp(s, &s.constant(x.clone()), p)?;
                    s.cross_entropy_loss(&logits, &labels)
                },
            )
            .unwrap();
        losses.push(report.loss);
    }
    let acc_after = evaluate(&[&w1, &b1, &w2, &b2]);

    let (first, last) = (losses[0], losses[losses.len() - 1]);
    assert!(last.is_finite());
    assert!(last < first);
    assert!(acc_after >= acc_before);
}
