use burn::{
    grad_clipping::GradientClippingConfig,
    module::{Param, ParamId},
    optim::{adaptor::OptimizerAdaptor, AdamW, AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::AutodiffBackend,
};
use nn::loss::{MseLoss, Reduction};

use crate::{
    env::{State, ACTION_COUNT, STATE_SIZE},
    error::{Error, Result},
    policy::{ActionValues, Policy},
    replay::Transition,
};

/// Q network with a soft updated target copy.
pub struct DqnPolicy<B: AutodiffBackend> {
    pub network: Model<B>,
    target: Model<B>,
    device: B::Device,
    optimizer: OptimizerAdaptor<AdamW<B::InnerBackend>, Model<B>, B>,
    tau: f32,
    gamma: f32,
    learning_rate: f32,
}

impl<B: AutodiffBackend> DqnPolicy<B> {
    fn batch_tensors(
        &self,
        batch: &[&Transition],
    ) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2, Int>, Tensor<B, 2>) {
        let n = batch.len();
        let mut states = Vec::with_capacity(n * STATE_SIZE);
        let mut next_states = Vec::with_capacity(n * STATE_SIZE);
        let mut actions = Vec::with_capacity(n);
        let mut rewards = Vec::with_capacity(n);
        for t in batch {
            states.extend_from_slice(&t.state);
            next_states.extend_from_slice(&t.next_state);
            actions.push(t.action.index() as i32);
            rewards.push(t.reward);
        }
        let states =
            Tensor::<B, 1>::from_floats(states.as_slice(), &self.device).reshape([n, STATE_SIZE]);
        let next_states = Tensor::<B, 1>::from_floats(next_states.as_slice(), &self.device)
            .reshape([n, STATE_SIZE]);
        let actions =
            Tensor::<B, 1, Int>::from_ints(actions.as_slice(), &self.device).reshape([n, 1]);
        let rewards = Tensor::<B, 1>::from_floats(rewards.as_slice(), &self.device).reshape([n, 1]);
        (states, next_states, actions, rewards)
    }

    fn soft_update_target(&mut self) {
        soft_update_linear(&mut self.target.linear0, &self.network.linear0, self.tau);
        soft_update_linear(&mut self.target.linear1, &self.network.linear1, self.tau);
        soft_update_linear(&mut self.target.linear2, &self.network.linear2, self.tau);
    }
}

impl<B: AutodiffBackend> Policy for DqnPolicy<B> {
    fn q_values(&self, state: &State) -> Result<ActionValues> {
        let x = Tensor::<B, 1>::from_floats(state.as_slice(), &self.device);
        let data = self.network.forward(x.unsqueeze()).into_data();
        let values = data.as_slice::<f32>().map_err(|e| Error::Policy {
            operation: "evaluate",
            message: format!("{:?}", e),
        })?;
        let mut out = [0.0; ACTION_COUNT];
        for (o, v) in out.iter_mut().zip(values) {
            *o = *v;
        }
        Ok(out)
    }

    fn train_batch(&mut self, batch: &[&Transition]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let (states, next_states, actions, rewards) = self.batch_tensors(batch);
        let state_action_values = self.network.forward(states).gather(1, actions);
        let next_state_values = self
            .target
            .forward(next_states)
            .max_dim(1)
            .detach();
        let expected_state_action_values = next_state_values.mul_scalar(self.gamma) + rewards;

        let loss = MseLoss.forward(
            state_action_values,
            expected_state_action_values,
            Reduction::Mean,
        );

        let gradients = loss.backward();
        let gradient_params = GradientsParams::from_grads(gradients, &self.network);
        self.network =
            self.optimizer
                .step(self.learning_rate as f64, self.network.clone(), gradient_params);
        // Shift target slowly.
        self.soft_update_target();
        Ok(())
    }

    fn save(&self) -> Result<Vec<u8>> {
        Recorder::<B>::record(
            &BinBytesRecorder::<FullPrecisionSettings>::default(),
            self.network.clone().into_record(),
            (),
        )
        .map_err(|e| Error::Policy {
            operation: "save",
            message: format!("{:?}", e),
        })
    }

    fn load(&mut self, bytes: &[u8]) -> Result<()> {
        let record: ModelRecord<B> = Recorder::<B>::load(
            &BinBytesRecorder::<FullPrecisionSettings>::default(),
            bytes.to_vec(),
            &self.device,
        )
        .map_err(|e| Error::Policy {
            operation: "load",
            message: format!("{:?}", e),
        })?;
        self.network = self.network.clone().load_record(record);
        self.target = self.network.clone();
        Ok(())
    }
}

#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    linear0: nn::Linear<B>,
    linear1: nn::Linear<B>,
    linear2: nn::Linear<B>,
    activation: nn::Relu,
}

impl<B: Backend> Model<B> {
    fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.linear0.forward(x));
        let x = self.activation.forward(self.linear1.forward(x));
        // Q values can be negative, so the output layer stays linear.
        self.linear2.forward(x)
    }
}

fn soft_update_linear<B: Backend>(target: &mut nn::Linear<B>, source: &nn::Linear<B>, tau: f32) {
    target.weight = soft_update_tensor(&target.weight, &source.weight, tau);
    if let (Some(this), Some(that)) = (target.bias.as_ref(), source.bias.as_ref()) {
        let bias = soft_update_tensor(this, that, tau);
        target.bias = Some(bias);
    }
}

fn soft_update_tensor<const N: usize, B: Backend>(
    this: &Param<Tensor<B, N>>,
    that: &Param<Tensor<B, N>>,
    tau: f32,
) -> Param<Tensor<B, N>> {
    let that_weight = that.val();
    let this_weight = this.val();
    let new_weight = this_weight * (1.0 - tau) + that_weight * tau;

    Param::initialized(ParamId::new(), new_weight)
}

#[derive(Config, Debug)]
pub struct DqnConfig {
    input_size: usize,
    hidden_size: usize,
    output_size: usize,
    tau: f32,
    gamma: f32,
    learning_rate: f32,
}

impl DqnConfig {
    pub fn from_settings(settings: &crate::config::Dqn) -> Self {
        Self::new(
            STATE_SIZE,
            settings.hidden_size as usize,
            ACTION_COUNT,
            settings.tau,
            settings.gamma,
            settings.learning_rate,
        )
    }

    /// Returns the initialized policy.
    pub fn init<B: AutodiffBackend>(&self, device: &B::Device) -> DqnPolicy<B> {
        let model = Model {
            linear0: nn::LinearConfig::new(self.input_size, self.hidden_size).init(device),
            linear1: nn::LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            linear2: nn::LinearConfig::new(self.hidden_size, self.output_size).init(device),
            activation: nn::Relu::new(),
        };
        let optimizer = AdamWConfig::new()
            .with_grad_clipping(Some(GradientClippingConfig::Value(100.0)))
            .init();
        DqnPolicy {
            network: model.clone(),
            target: model,
            device: device.clone(),
            optimizer,
            tau: self.tau,
            gamma: self.gamma,
            learning_rate: self.learning_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Action;

    type TestBackend = burn::backend::Autodiff<burn::backend::NdArray>;

    fn policy(gamma: f32) -> DqnPolicy<TestBackend> {
        DqnConfig::new(STATE_SIZE, 16, ACTION_COUNT, 0.05, gamma, 1e-2).init(&Default::default())
    }

    fn state(v: f32) -> State {
        [v; STATE_SIZE]
    }

    #[test]
    fn evaluates_one_value_per_action() {
        let p = policy(0.9);
        let values = p.q_values(&state(0.5)).unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let trained = policy(0.9);
        let bytes = trained.save().unwrap();
        assert!(!bytes.is_empty());

        let mut fresh = policy(0.9);
        fresh.load(&bytes).unwrap();
        let s = state(0.25);
        assert_eq!(trained.q_values(&s).unwrap(), fresh.q_values(&s).unwrap());
    }

    #[test]
    fn load_rejects_garbage() {
        let mut p = policy(0.9);
        assert!(matches!(
            p.load(&[1, 2, 3]),
            Err(Error::Policy {
                operation: "load",
                ..
            })
        ));
    }

    #[test]
    fn training_moves_value_toward_target() {
        let mut p = policy(0.0);
        let t = Transition {
            state: state(0.5),
            action: Action::Jump,
            reward: 3.0,
            next_state: state(0.6),
        };
        let error = |p: &DqnPolicy<TestBackend>| {
            (p.q_values(&t.state).unwrap()[Action::Jump.index()] - t.reward).abs()
        };
        let before = error(&p);
        for _ in 0..200 {
            p.train_batch(&[&t, &t]).unwrap();
        }
        assert!(error(&p) < before);
        assert!(error(&p) < 0.5);
    }
}
